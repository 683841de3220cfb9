use inbox_relay::classify::{default_rules, ActionClassifier, ActionRule};
use inbox_relay::models::FlaggedAction;
use inbox_relay::source::fixture::demo_messages;

#[test]
fn reply_request_needs_approval() {
    let verdict = ActionClassifier::default()
        .classify("Could you please review the proposal and send me your feedback?");

    assert!(verdict.approval_needed);
    assert_eq!(verdict.actions, vec![FlaggedAction::SendEmail]);
}

#[test]
fn newsletter_is_archived_without_approval() {
    let verdict = ActionClassifier::default().classify("Weekly newsletter: this week in AI");

    assert!(!verdict.approval_needed);
    assert_eq!(verdict.actions, vec![FlaggedAction::Archive]);
}

#[test]
fn actions_follow_rule_order() {
    let verdict = ActionClassifier::default()
        .classify("Digest attached. Can we schedule a meeting and then reply to the group?");

    assert_eq!(
        verdict.actions,
        vec![
            FlaggedAction::SendEmail,
            FlaggedAction::ScheduleMeeting,
            FlaggedAction::Archive,
        ]
    );
    assert!(verdict.approval_needed);
}

#[test]
fn plain_text_yields_nothing() {
    let verdict = ActionClassifier::default().classify("Lunch menu for Tuesday");
    assert!(!verdict.approval_needed);
    assert!(verdict.actions.is_empty());
}

#[test]
fn demo_messages_classify_as_expected() {
    let classifier = ActionClassifier::default();
    let verdicts: Vec<_> = demo_messages()
        .iter()
        .map(|msg| classifier.classify(&msg.body))
        .collect();

    assert_eq!(verdicts[0].actions, vec![FlaggedAction::SendEmail]);
    assert!(verdicts[0].approval_needed);
    assert_eq!(verdicts[1].actions, vec![FlaggedAction::ScheduleMeeting]);
    assert!(!verdicts[1].approval_needed);
    assert_eq!(verdicts[2].actions, vec![FlaggedAction::Archive]);
}

#[test]
fn rules_deserialize_from_toml() {
    #[derive(serde::Deserialize)]
    struct Table {
        rules: Vec<ActionRule>,
    }

    let table: Table = toml::from_str(
        r#"
[[rules]]
keywords = ["invoice", "receipt"]
action = "archive"
"#,
    )
    .expect("rules parse");
    let classifier = ActionClassifier::new(table.rules);

    assert_eq!(classifier.rules().len(), 1);
    assert!(!classifier.rules()[0].requires_approval);
    assert_eq!(
        classifier.classify("Your Receipt").actions,
        vec![FlaggedAction::Archive]
    );
}

#[test]
fn default_table_is_the_builtin_vocabulary() {
    assert_eq!(ActionClassifier::default().rules(), default_rules().as_slice());
}
