mod common;

use common::{MemoryStorage, TestApp, TestOptions};
use converter_service::services::Storage;
use std::path::Path;
use std::sync::Arc;

async fn app_with(storage: Arc<MemoryStorage>, keep_local: bool) -> TestApp {
    TestApp::spawn_with(TestOptions {
        storage: Some(storage as Arc<dyn Storage>),
        keep_local,
        ..Default::default()
    })
    .await
}

fn uploaded(status: &serde_json::Value) -> bool {
    status["object_key"].is_string()
}

#[tokio::test]
async fn completed_file_is_uploaded_and_local_copies_removed() {
    let storage = MemoryStorage::new();
    let app = app_with(storage.clone(), false).await;

    let task_id = app.submit("report.doc", b"payload").await;
    let status = app
        .wait_until(&task_id, |s| s["local_files_removed"] == true)
        .await;

    let expected_key = format!("{}/report.docx", task_id);
    assert_eq!(status["status"], "completed");
    assert_eq!(status["bucket"], "converted-files");
    assert_eq!(status["object_key"], expected_key.as_str());
    assert_eq!(
        storage.object(&expected_key).as_deref(),
        Some(&b"converted:payload"[..])
    );

    assert!(!app.upload_dir.join(format!("{}.doc", task_id)).exists());
    assert!(!app.converted_dir.join(&task_id).exists());
}

#[tokio::test]
async fn download_returns_link_for_uploaded_file() {
    let storage = MemoryStorage::new();
    let app = app_with(storage, false).await;

    let task_id = app.submit("report.doc", b"payload").await;
    app.wait_until(&task_id, uploaded).await;

    let response = app.get(&format!("/download/{}", task_id)).await;
    assert_eq!(response.status().as_u16(), 200);

    let body: serde_json::Value = response.json().await.unwrap();
    let url = body["url"].as_str().unwrap();
    assert!(url.contains(&format!("{}/report.docx", task_id)));
    assert!(url.contains("expires=86400"));
    assert!(body["message"].is_string());
    assert!(body["usage"].as_str().unwrap().contains(url));
}

#[tokio::test]
async fn share_link_carries_ready_made_commands() {
    let storage = MemoryStorage::new();
    let app = app_with(storage, false).await;

    let task_id = app.submit("budget.xls", b"payload").await;
    app.wait_until(&task_id, uploaded).await;

    let response = app.get(&format!("/share/{}", task_id)).await;
    assert_eq!(response.status().as_u16(), 200);

    let body: serde_json::Value = response.json().await.unwrap();
    let url = body["url"].as_str().unwrap();
    assert_eq!(body["expires"], "24h");
    assert_eq!(
        body["download_command"],
        format!("curl -o \"budget.xlsx\" \"{}\"", url)
    );
    assert_eq!(
        body["wget_command"],
        format!("wget -O \"budget.xlsx\" \"{}\"", url)
    );
}

#[tokio::test]
async fn keep_local_query_keeps_files_after_upload() {
    let storage = MemoryStorage::new();
    let app = app_with(storage.clone(), false).await;

    let response = app
        .upload_to("/convert?keep_local=true", "keep.ppt", b"payload")
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    let task_id = body["task_id"].as_str().unwrap().to_string();

    let status = app.wait_until(&task_id, uploaded).await;
    assert_eq!(status["keep_local"], true);
    assert_eq!(status["local_files_removed"], false);
    assert!(Path::new(status["converted_file"].as_str().unwrap()).exists());
    assert!(app.upload_dir.join(format!("{}.ppt", task_id)).exists());
    assert_eq!(storage.keys(), vec![format!("{}/keep.pptx", task_id)]);
}

#[tokio::test]
async fn server_default_keep_local_applies_without_query() {
    let storage = MemoryStorage::new();
    let app = app_with(storage, true).await;

    let task_id = app.submit("keep.doc", b"payload").await;
    let status = app.wait_until(&task_id, uploaded).await;

    assert_eq!(status["keep_local"], true);
    assert!(Path::new(status["converted_file"].as_str().unwrap()).exists());
}

#[tokio::test]
async fn query_can_override_server_keep_local_default() {
    let storage = MemoryStorage::new();
    let app = app_with(storage, true).await;

    let response = app
        .upload_to("/convert?keep_local=false", "drop.doc", b"payload")
        .await;
    let body: serde_json::Value = response.json().await.unwrap();
    let task_id = body["task_id"].as_str().unwrap().to_string();

    let status = app
        .wait_until(&task_id, |s| s["local_files_removed"] == true)
        .await;
    assert_eq!(status["keep_local"], false);
}

#[tokio::test]
async fn failed_upload_keeps_task_completed_and_local() {
    let app = app_with(MemoryStorage::failing(), false).await;

    let task_id = app.submit("report.doc", b"payload").await;
    let status = app.wait_for_finish(&task_id).await;
    assert_eq!(status["status"], "completed");

    // Give the worker time to attempt the upload
    tokio::time::sleep(std::time::Duration::from_millis(300)).await;
    let status = app.status(&task_id).await;
    assert!(status.get("object_key").is_none());
    assert_eq!(status["local_files_removed"], false);

    let response = app.get(&format!("/download/{}", task_id)).await;
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(
        &response.bytes().await.unwrap()[..],
        b"converted:payload"
    );

    let share = app.get(&format!("/share/{}", task_id)).await;
    assert_eq!(share.status().as_u16(), 400);
}
