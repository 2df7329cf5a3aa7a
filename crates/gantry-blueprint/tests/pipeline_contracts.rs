//! Contract tests for the ingest pipeline composite and manifest shape.
//!
//! The manifest is the handoff format to provisioning, so its shape is a
//! contract: entry names, injected environment keys, and relay
//! parameters must come out of synthesis exactly as declared.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::num::NonZeroU32;

use gantry_blueprint::blueprint::{BindingOptions, Blueprint, GrantAction};
use gantry_blueprint::bucket::BucketSpec;
use gantry_blueprint::certificate::CertificateSpec;
use gantry_blueprint::function::FunctionSpec;
use gantry_blueprint::network::NetworkSpec;
use gantry_blueprint::pipeline::{
    dropbox_env, ingest_env, IngestPipeline, IngestPipelineConfig,
};
use gantry_blueprint::queue::QueueSpec;
use gantry_blueprint::search::SearchDomainSpec;
use gantry_blueprint::Manifest;

fn default_pipeline() -> (Blueprint, IngestPipeline) {
    gantry_test_utils::init_test_logging();
    let mut blueprint = Blueprint::new("ingest");
    let pipeline =
        IngestPipeline::build(&mut blueprint, &IngestPipelineConfig::default()).unwrap();
    (blueprint, pipeline)
}

/// Every provisioning input a harness needs must be in the manifest:
/// bucket names, queue names with relay parameters, the status table,
/// and both function environments.
#[test]
fn manifest_carries_every_provisioning_input() {
    let (blueprint, pipeline) = default_pipeline();
    let manifest = blueprint.synth().unwrap();

    assert_eq!(manifest.buckets.len(), 3);
    assert_eq!(manifest.queues.len(), 4);
    assert_eq!(manifest.tables.len(), 1);
    assert_eq!(manifest.functions.len(), 2);
    assert_eq!(manifest.notifications.len(), 2);
    assert_eq!(manifest.bindings.len(), 2);

    let queue = manifest.queue(pipeline.dropbox_queue.name()).unwrap();
    assert_eq!(queue.visibility_timeout_secs, 20 * 60);
    let dead_letter = queue.dead_letter.as_ref().unwrap();
    assert_eq!(dead_letter.max_receive_count, 1);

    let dlq = manifest.queue(pipeline.dropbox_dead_letter.name()).unwrap();
    assert_eq!(dlq.retention_secs, 14 * 24 * 60 * 60);

    let batch = manifest
        .binding(pipeline.dropbox_function.name(), pipeline.dropbox_queue.name())
        .unwrap();
    assert_eq!(batch, NonZeroU32::MIN);

    let table = &manifest.tables[0];
    assert_eq!(table.name.as_str(), "ingest_status");
    assert!(table.point_in_time_recovery);
}

/// The injected environment must name every resource a unit touches:
/// its buckets, the queue it consumes, the status table, and the search
/// endpoint.
#[test]
fn environment_contracts_name_every_dependency() {
    let mut blueprint = Blueprint::new("ingest");
    let config = IngestPipelineConfig::default()
        .with_search_endpoint("https://search.opensearch.example.com");
    let pipeline = IngestPipeline::build(&mut blueprint, &config).unwrap();
    let manifest = blueprint.synth().unwrap();

    let dropbox = manifest.function(pipeline.dropbox_function.name()).unwrap();
    for key in [
        dropbox_env::DROPBOX_BUCKET_NAME,
        dropbox_env::INGEST_BUCKET_NAME,
        dropbox_env::DROPBOX_QUEUE_NAME,
        dropbox_env::CONSOLE_LOG_LEVEL,
    ] {
        assert!(
            dropbox.environment.contains_key(key),
            "dropbox environment is missing {key}"
        );
    }

    let ingest = manifest.function(pipeline.ingest_function.name()).unwrap();
    for key in [
        ingest_env::OPEN_SEARCH_ENDPOINT,
        ingest_env::BUCKET_NAME,
        ingest_env::INGEST_STATUS_TABLE,
        ingest_env::INGEST_STATUS_FILE_NAME_GSI,
        ingest_env::CONSOLE_LOG_LEVEL,
        ingest_env::CHUNK_SIZE_MB,
        ingest_env::GENERATE_IDS,
        ingest_env::MAX_PROCESSES,
        ingest_env::MAX_FILE_SIZE_MB,
        ingest_env::OPENSEARCH_CLIENT_REQUEST_TIMEOUT,
    ] {
        assert!(
            ingest.environment.contains_key(key),
            "ingest environment is missing {key}"
        );
    }
    assert_eq!(
        ingest.environment.get(ingest_env::OPEN_SEARCH_ENDPOINT),
        Some("https://search.opensearch.example.com")
    );
}

/// Wiring grants access as a side effect: the notifying bucket may send
/// to its queue, and each bound function may consume its queue.
#[test]
fn wiring_records_the_expected_grants() {
    let (blueprint, _pipeline) = default_pipeline();
    let manifest = blueprint.synth().unwrap();

    let has = |grantee: &str, action: GrantAction, resource: &str| {
        manifest
            .grants
            .iter()
            .any(|g| g.grantee == grantee && g.action == action && g.resource == resource)
    };

    assert!(has("dropbox", GrantAction::SendMessages, "dropbox-queue"));
    assert!(has(
        "dropbox-processor",
        GrantAction::ConsumeMessages,
        "dropbox-queue"
    ));
    assert!(has(
        "dropbox-processor",
        GrantAction::ReadWriteObjects,
        "ingest-bucket"
    ));
    assert!(has(
        "ingest-processor",
        GrantAction::ReadWriteItems,
        "ingest_status"
    ));
}

/// Synthesis is deterministic: declaration order never changes the JSON.
#[test]
fn manifest_json_is_order_independent() {
    let (first, _) = default_pipeline();

    let mut second = Blueprint::new("ingest");
    // Declare some extra resources first so indices differ, then remove
    // nothing: the composite must not depend on being declared first.
    let spare_bucket = second.add_bucket(BucketSpec::new("spare").unwrap()).unwrap();
    let spare_queue = second.add_queue(QueueSpec::new("spare-queue").unwrap()).unwrap();
    let spare_function = second
        .add_function(FunctionSpec::new("spare-fn").unwrap())
        .unwrap();
    IngestPipeline::build(&mut second, &IngestPipelineConfig::default()).unwrap();
    second
        .notify_on_object_created(&spare_bucket, &spare_queue)
        .unwrap();
    second
        .bind_queue(&spare_function, &spare_queue, BindingOptions::default())
        .unwrap();

    let mut third = Blueprint::new("ingest");
    IngestPipeline::build(&mut third, &IngestPipelineConfig::default()).unwrap();
    let spare_bucket = third.add_bucket(BucketSpec::new("spare").unwrap()).unwrap();
    let spare_queue = third.add_queue(QueueSpec::new("spare-queue").unwrap()).unwrap();
    let spare_function = third
        .add_function(FunctionSpec::new("spare-fn").unwrap())
        .unwrap();
    third
        .notify_on_object_created(&spare_bucket, &spare_queue)
        .unwrap();
    third
        .bind_queue(&spare_function, &spare_queue, BindingOptions::default())
        .unwrap();

    assert_eq!(
        second.synth().unwrap().to_json().unwrap(),
        third.synth().unwrap().to_json().unwrap()
    );
    // And the plain pipeline manifest parses back to itself.
    let json = first.synth().unwrap().to_json().unwrap();
    assert_eq!(Manifest::from_json(&json).unwrap().to_json().unwrap(), json);
}

/// Search domain, certificate, and network entries render alongside the
/// pipeline for deployments that attach them.
#[test]
fn auxiliary_resources_render_into_the_manifest() {
    let mut blueprint = Blueprint::new("ingest");
    let domain = blueprint
        .add_search_domain(
            SearchDomainSpec::new("ingest-search", "opensearch.example.com").unwrap(),
        )
        .unwrap();
    blueprint
        .add_certificate(CertificateSpec::new("opensearch.example.com").unwrap())
        .unwrap();
    blueprint
        .add_network(NetworkSpec::new("ingest-vpc").unwrap())
        .unwrap();

    let endpoint = blueprint.search_domain(&domain).unwrap().endpoint_url();
    let config = IngestPipelineConfig::default().with_search_endpoint(endpoint);
    let pipeline = IngestPipeline::build(&mut blueprint, &config).unwrap();
    let manifest = blueprint.synth().unwrap();

    assert_eq!(manifest.search_domains.len(), 1);
    let entry = &manifest.search_domains[0];
    assert_eq!(entry.endpoint, "search.opensearch.example.com");
    assert_eq!(entry.engine_version, "2.9");
    assert_eq!(entry.snapshot_repo, "opensearch-snapshot-repo");

    assert_eq!(manifest.certificates.len(), 1);
    assert_eq!(manifest.certificates[0].domain_name, "*.opensearch.example.com");

    assert_eq!(manifest.networks.len(), 1);
    assert_eq!(manifest.networks[0].cidr.to_string(), "10.1.0.0/16");
    assert_eq!(manifest.networks[0].nat_gateways, 0);

    let ingest = manifest.function(pipeline.ingest_function.name()).unwrap();
    assert_eq!(
        ingest.environment.get(ingest_env::OPEN_SEARCH_ENDPOINT),
        Some("https://search.opensearch.example.com")
    );
}
