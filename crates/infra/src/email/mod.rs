//! Production email delivery.

mod resend;

pub use resend::ResendEmailSender;
