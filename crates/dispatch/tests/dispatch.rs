//! Behavioural tests for the dispatcher against a recording trigger.

use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use dispatch::{
    AzureRegion, Disposition, DispatchSettings, Dispatcher, MessageHandler, MessageId,
    PublishedImageMessage, RejectReason, RunConfiguration, SubscriptionId, SupportedImages,
    TestTrigger, Topic, TriggerError, TriggerOutcome,
};
use rstest::rstest;
use serde_json::json;

const RESOURCE_ID: &str = "/subscriptions/test-sub/resourceGroups/test-rg/providers/Microsoft.Compute/galleries/test-gallery";

enum Behaviour {
    Exit(TriggerOutcome),
    CannotLaunch,
}

struct RecordingTrigger {
    behaviour: Behaviour,
    runs: Mutex<Vec<RunConfiguration>>,
}

impl RecordingTrigger {
    fn new(behaviour: Behaviour) -> Self {
        Self { behaviour, runs: Mutex::new(Vec::new()) }
    }

    fn runs(&self) -> Vec<RunConfiguration> {
        self.runs.lock().unwrap().clone()
    }
}

#[async_trait]
impl TestTrigger for RecordingTrigger {
    async fn trigger(&self, run: RunConfiguration) -> Result<TriggerOutcome, TriggerError> {
        self.runs.lock().unwrap().push(run);
        match &self.behaviour {
            Behaviour::Exit(outcome) => Ok(*outcome),
            Behaviour::CannotLaunch => Err(TriggerError::Launch {
                program: "lisa".into(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
            }),
        }
    }
}

fn settings() -> DispatchSettings {
    DispatchSettings {
        region: AzureRegion::new("westus3").unwrap(),
        subscription_id: SubscriptionId::new("00000000-0000-0000-0000-000000000000").unwrap(),
        private_key: Some(PathBuf::from("/home/fedora/.ssh/id_rsa")),
        custom_run_name: true,
    }
}

fn dispatcher(behaviour: Behaviour) -> Dispatcher<RecordingTrigger> {
    Dispatcher::new(SupportedImages::default(), settings(), RecordingTrigger::new(behaviour))
}

fn message(definition: &str) -> PublishedImageMessage {
    PublishedImageMessage::from_body(json!({
        "architecture": if definition.ends_with("Arm64") { "aarch64" } else { "x86_64" },
        "compose_id": "Fedora-Rawhide-20250101.n.0",
        "image_definition_name": definition,
        "image_version_name": "20250101.0",
        "image_resource_id": RESOURCE_ID,
    }))
    .with_id(MessageId::new("5b2e6f0a-1c1d-4e0e-8f4a-2f7d3e9c0b11").unwrap())
    .with_topic(
        Topic::new(format!(
            "org.fedoraproject.prod.fedora_image_uploader.published.v1.azure.{definition}"
        ))
        .unwrap(),
    )
}

#[tokio::test]
async fn rawhide_x86_64_triggers_once_in_westus3() {
    let dispatcher = dispatcher(Behaviour::Exit(TriggerOutcome::Passed));

    let disposition = dispatcher.dispatch(&message("Fedora-Cloud-Rawhide-x64")).await;

    let runs = dispatcher.trigger().runs();
    assert_eq!(runs.len(), 1);
    let run = &runs[0];
    assert_eq!(run.region.as_str(), "westus3");
    assert_eq!(run.image.as_str(), "westus3/test-sub/Fedora-Cloud-Rawhide-x64/20250101.0");
    assert_eq!(run.image_definition.as_str(), "Fedora-Cloud-Rawhide-x64");
    assert_eq!(run.subscription_id.as_str(), "00000000-0000-0000-0000-000000000000");
    assert_eq!(run.private_key, Some(PathBuf::from("/home/fedora/.ssh/id_rsa")));
    assert!(run.run_name.is_some());
    assert_eq!(
        disposition,
        Disposition::Completed { run_id: run.run_id, outcome: TriggerOutcome::Passed }
    );
}

#[rstest]
#[case("Fedora-Cloud-30-x64")]
#[case("Fedora-Cloud-Unsupported-x64")]
#[case("Fedora-Cloud-42-ppc64le")]
#[case("Fedora-Cloud-042-x64")]
#[case("Fedora-Cloud-+42-x64")]
#[case("Fedora-Cloud-rawhide-x64")]
#[case("Fedora-Cloud-RAWHIDE-Arm64")]
#[tokio::test]
async fn unsupported_images_never_reach_the_trigger(#[case] definition: &str) {
    let dispatcher = dispatcher(Behaviour::Exit(TriggerOutcome::Passed));

    let disposition = dispatcher.dispatch(&message(definition)).await;

    assert!(!disposition.is_accepted());
    assert!(dispatcher.trigger().runs().is_empty());
}

#[tokio::test]
async fn every_supported_pair_triggers_with_matching_image() {
    for definition in SupportedImages::default().definition_names() {
        let dispatcher = dispatcher(Behaviour::Exit(TriggerOutcome::Passed));
        dispatcher.dispatch(&message(&definition)).await;

        let runs = dispatcher.trigger().runs();
        assert_eq!(runs.len(), 1, "{definition}");
        assert!(runs[0].image.as_str().ends_with(&format!("/{definition}/20250101.0")));
    }
}

#[tokio::test]
async fn redelivery_yields_the_same_decision() {
    let dispatcher = dispatcher(Behaviour::Exit(TriggerOutcome::Passed));

    for definition in ["Fedora-Cloud-42-Arm64", "Fedora-Cloud-30-x64"] {
        let msg = message(definition);
        let first = dispatcher.evaluate(&msg);
        let second = dispatcher.evaluate(&msg.clone());
        assert_eq!(first, second);
    }
}

#[tokio::test]
async fn failed_run_is_reported_not_retried() {
    let dispatcher = dispatcher(Behaviour::Exit(TriggerOutcome::Failed { code: Some(2) }));

    let disposition = dispatcher.handle(message("Fedora-Cloud-41-x64")).await;

    assert_eq!(dispatcher.trigger().runs().len(), 1);
    assert!(matches!(
        disposition,
        Disposition::Completed { outcome: TriggerOutcome::Failed { code: Some(2) }, .. }
    ));
}

#[tokio::test]
async fn launch_failure_is_captured_in_disposition() {
    let dispatcher = dispatcher(Behaviour::CannotLaunch);

    let disposition = dispatcher.dispatch(&message("Fedora-Cloud-Rawhide-Arm64")).await;

    assert_eq!(dispatcher.trigger().runs().len(), 1);
    match disposition {
        Disposition::TriggerFailed { error, .. } => assert!(error.contains("lisa")),
        other => panic!("unexpected disposition: {other:?}"),
    }
}

#[tokio::test]
async fn run_name_is_omitted_when_disabled() {
    let settings = DispatchSettings { custom_run_name: false, private_key: None, ..settings() };
    let dispatcher = Dispatcher::new(
        SupportedImages::default(),
        settings,
        RecordingTrigger::new(Behaviour::Exit(TriggerOutcome::Passed)),
    );

    dispatcher.dispatch(&message("Fedora-Cloud-Rawhide-x64")).await;

    let runs = dispatcher.trigger().runs();
    assert_eq!(runs[0].run_name, None);
    assert_eq!(runs[0].private_key, None);
}

#[tokio::test]
async fn non_object_body_is_rejected_without_trigger() {
    let dispatcher = dispatcher(Behaviour::Exit(TriggerOutcome::Passed));

    let disposition =
        dispatcher.dispatch(&PublishedImageMessage::from_body(json!("not_a_dict"))).await;

    assert_eq!(disposition, Disposition::Rejected(RejectReason::BodyNotObject));
    assert!(dispatcher.trigger().runs().is_empty());
}
