//! SendmailNotifier against a scripted sendmail. Kept in its own test binary
//! so no other test forks while the script is being written.

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;

use sisyphus_core::ChangesetId;
use sisyphus_osm::RevertErrorKind;
use sisyphus_runner::{Notifier, SendmailNotifier};

#[test]
fn message_is_piped_to_sendmail_with_recipient_flags() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("mail.txt");
    let script = dir.path().join("sendmail");
    fs::write(
        &script,
        format!(
            "#!/bin/sh\necho \"$@\" > {0}.args\ncat > {0}\n",
            out.display()
        ),
    )
    .unwrap();
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

    let notifier = SendmailNotifier::new(&script, "Sisyphus 1.0", "ops@example.org").unwrap();
    notifier.notify_failure(
        ChangesetId(77),
        RevertErrorKind::TooManyChanges,
        "would not revert 60 changes (limit is 50)",
    );

    let mail = fs::read_to_string(&out).unwrap();
    assert!(mail.contains("To: ops@example.org"));
    assert!(mail.contains("Subject: Error reverting a changeset"));
    assert!(mail.contains("Error reverting changeset 77:"));
    assert!(mail.contains("TooManyChanges: would not revert 60 changes"));

    let args = fs::read_to_string(dir.path().join("mail.txt.args")).unwrap();
    assert_eq!(args.trim(), "-t -oi");
}
