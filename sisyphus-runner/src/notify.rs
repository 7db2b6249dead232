//! Failure notification.
//!
//! Per-changeset failures are mailed to the operator. Delivery is best-effort:
//! [`Notifier::notify_failure`] cannot fail, and anything that goes wrong while
//! composing or sending the mail is only logged.

use std::io::{ErrorKind, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};

use chrono::Utc;
use tera::{Context, Tera};

use sisyphus_core::{ChangesetId, Config};
use sisyphus_osm::RevertErrorKind;

use crate::error::NotifyError;

pub const SUBJECT: &str = "Error reverting a changeset";

const TEMPLATE_NAME: &str = "failure_mail.tera";
const TEMPLATE: &str = include_str!("templates/failure_mail.tera");

pub trait Notifier {
    fn notify_failure(&self, changeset: ChangesetId, kind: RevertErrorKind, detail: &str);
}

impl<T: Notifier + ?Sized> Notifier for &T {
    fn notify_failure(&self, changeset: ChangesetId, kind: RevertErrorKind, detail: &str) {
        (**self).notify_failure(changeset, kind, detail)
    }
}

impl<T: Notifier + ?Sized> Notifier for Box<T> {
    fn notify_failure(&self, changeset: ChangesetId, kind: RevertErrorKind, detail: &str) {
        (**self).notify_failure(changeset, kind, detail)
    }
}

/// Drops every notification. Used when `fail_mail` is empty.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify_failure(&self, changeset: ChangesetId, kind: RevertErrorKind, _detail: &str) {
        tracing::debug!(%changeset, %kind, "mail disabled; failure not sent");
    }
}

/// Hands a plain-text message to a local `sendmail -t -oi`.
pub struct SendmailNotifier {
    sendmail: PathBuf,
    from: String,
    to: String,
    tera: Tera,
}

impl SendmailNotifier {
    pub fn new(
        sendmail: impl Into<PathBuf>,
        from: impl Into<String>,
        to: impl Into<String>,
    ) -> Result<Self, NotifyError> {
        let mut tera = Tera::default();
        tera.add_raw_template(TEMPLATE_NAME, TEMPLATE)?;
        Ok(Self {
            sendmail: sendmail.into(),
            from: from.into(),
            to: to.into(),
            tera,
        })
    }

    /// Full message, headers included, ready for `sendmail -t`.
    pub fn compose(
        &self,
        changeset: ChangesetId,
        kind: RevertErrorKind,
        detail: &str,
    ) -> Result<String, NotifyError> {
        let mut ctx = Context::new();
        ctx.insert("from", &self.from);
        ctx.insert("to", &self.to);
        ctx.insert("subject", SUBJECT);
        ctx.insert("date", &Utc::now().to_rfc2822());
        ctx.insert("changeset", &changeset);
        ctx.insert("kind", &kind.to_string());
        ctx.insert("detail", detail);
        Ok(self.tera.render(TEMPLATE_NAME, &ctx)?)
    }

    pub fn send(&self, message: &str) -> Result<(), NotifyError> {
        let spawn_err = |source: std::io::Error| NotifyError::Spawn {
            path: self.sendmail.clone(),
            source,
        };
        let mut child = Command::new(&self.sendmail)
            .args(["-t", "-oi"])
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .spawn()
            .map_err(spawn_err)?;
        if let Some(mut stdin) = child.stdin.take() {
            // A sendmail that exits early is reported through its status below.
            if let Err(e) = stdin.write_all(message.as_bytes()) {
                if e.kind() != ErrorKind::BrokenPipe {
                    return Err(spawn_err(e));
                }
            }
        }
        let status = child.wait().map_err(spawn_err)?;
        if !status.success() {
            return Err(NotifyError::Exit {
                path: self.sendmail.clone(),
                status,
            });
        }
        Ok(())
    }
}

impl Notifier for SendmailNotifier {
    fn notify_failure(&self, changeset: ChangesetId, kind: RevertErrorKind, detail: &str) {
        let result = self
            .compose(changeset, kind, detail)
            .and_then(|message| self.send(&message));
        match result {
            Ok(()) => tracing::info!(%changeset, to = %self.to, "failure mail sent"),
            Err(e) => tracing::error!(%changeset, "could not send failure mail: {e}"),
        }
    }
}

/// [`SendmailNotifier`] when `fail_mail` is set, otherwise [`NullNotifier`].
pub fn notifier_from_config(config: &Config) -> Result<Box<dyn Notifier>, NotifyError> {
    if !config.mail_enabled() {
        return Ok(Box::new(NullNotifier));
    }
    Ok(Box::new(SendmailNotifier::new(
        &config.sendmail,
        &config.created_by,
        &config.fail_mail,
    )?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notifier(sendmail: &str) -> SendmailNotifier {
        SendmailNotifier::new(sendmail, "Sisyphus 1.0", "ops@example.org").unwrap()
    }

    #[test]
    fn message_carries_headers_and_error() {
        let msg = notifier("/usr/sbin/sendmail")
            .compose(
                ChangesetId(101),
                RevertErrorKind::Upload,
                "HTTP 409: Version mismatch",
            )
            .unwrap();
        assert!(msg.starts_with("From: Sisyphus 1.0\nTo: ops@example.org\n"), "{msg}");
        assert!(msg.contains("Subject: Error reverting a changeset\n"));
        assert!(msg.contains("Error reverting changeset 101:"));
        assert!(msg.contains("UploadError: HTTP 409: Version mismatch"));
    }

    #[test]
    fn headers_end_before_body() {
        let msg = notifier("/usr/sbin/sendmail")
            .compose(ChangesetId(5), RevertErrorKind::Create, "HTTP 401")
            .unwrap();
        let (headers, body) = msg.split_once("\n\n").expect("blank line");
        assert!(headers.lines().all(|l| l.contains(": ")), "{headers}");
        assert!(body.contains("CreateError"));
    }

    #[test]
    fn detail_is_not_html_escaped() {
        let msg = notifier("/usr/sbin/sendmail")
            .compose(ChangesetId(5), RevertErrorKind::Download, "<osm> & friends")
            .unwrap();
        assert!(msg.contains("<osm> & friends"));
    }

    #[test]
    fn missing_sendmail_is_swallowed() {
        let n = notifier("/nonexistent/sendmail");
        let err = n.send("To: x\n\nbody").unwrap_err();
        assert!(matches!(err, NotifyError::Spawn { .. }));
        // Must not panic.
        n.notify_failure(ChangesetId(1), RevertErrorKind::Close, "HTTP 500");
    }

    #[cfg(unix)]
    #[test]
    fn failing_sendmail_reports_exit_status() {
        let err = notifier("false").send("To: x\n\nbody").unwrap_err();
        assert!(matches!(err, NotifyError::Exit { .. }), "got: {err}");
    }
}
