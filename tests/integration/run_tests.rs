//! Orchestrated runs against targets that cannot be reached.

use edge_doctor::checks::{Category, Status};
use edge_doctor::diagnose::Orchestrator;
use edge_doctor::inventory::Inventory;

const INVENTORY: &str = r#"
unreachable:
  connection:
    hostname: 192.0.2.99
    username: op
    ssh_key_path: /nonexistent/id_edge
  services:
    systemd_services: [nginx]
"#;

#[tokio::test]
async fn unreachable_target_yields_a_single_connection_failure() {
    let inventory = Inventory::parse(INVENTORY).unwrap();
    let (target, host) = inventory.target("unreachable").unwrap();

    // No key file on disk and no password: the bootstrap exhausts its
    // credential chain without opening a transport.
    let outcome = Orchestrator::new()
        .run(&target, host, &Category::ALL)
        .await;

    assert!(!outcome.overall_success);
    assert_eq!(outcome.results.len(), 1);
    assert_eq!(outcome.results[0].check, "SSH Connection");
    assert_eq!(outcome.results[0].status, Status::Fail);
    // The failure carries operator guidance, not just an error code.
    assert!(outcome.results[0].message.contains("ssh op@192.0.2.99"));
}

#[tokio::test]
async fn connection_failure_is_reported_even_with_no_categories() {
    let inventory = Inventory::parse(INVENTORY).unwrap();
    let (target, host) = inventory.target("unreachable").unwrap();

    let outcome = Orchestrator::new().run(&target, host, &[]).await;

    assert_eq!(outcome.results.len(), 1);
    assert_eq!(outcome.results[0].check, "SSH Connection");
}

#[tokio::test]
async fn outcome_serializes_for_json_output() {
    let inventory = Inventory::parse(INVENTORY).unwrap();
    let (target, host) = inventory.target("unreachable").unwrap();

    let outcome = Orchestrator::new().run(&target, host, &[]).await;
    let json = serde_json::to_value(&outcome).unwrap();

    assert_eq!(json["target"], "unreachable");
    assert_eq!(json["overall_success"], false);
    assert_eq!(json["results"][0]["status"], "fail");
    // No logs were captured, so the field must be absent entirely.
    assert!(json["results"][0].get("logs").is_none());
}
