/// Google Docs / Drive 客户端
///
/// 直接调用 REST 接口，每次请求前向 [`GoogleAuth`] 取 access_token
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::doc_requests;
use super::google_auth::GoogleAuth;
use crate::services::document_service::{DocumentService, FileUpload, RemoteFile};

const DOCS_API: &str = "https://docs.googleapis.com/v1/documents";
const DRIVE_API: &str = "https://www.googleapis.com/drive/v3/files";
const DRIVE_UPLOAD_API: &str = "https://www.googleapis.com/upload/drive/v3/files";

/// Google Docs / Drive 客户端
pub struct GoogleWorkspace {
    http: reqwest::Client,
    auth: Arc<GoogleAuth>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedDocument {
    document_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreatedFile {
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<FileEntry>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FileEntry {
    id: String,
    #[serde(default)]
    name: String,
}

impl GoogleWorkspace {
    pub fn new(http: reqwest::Client, auth: Arc<GoogleAuth>) -> Self {
        Self { http, auth }
    }

    async fn request(&self, method: Method, url: &str) -> Result<RequestBuilder> {
        let token = self.auth.access_token().await?;
        Ok(self.http.request(method, url).bearer_auth(token))
    }

    /// 发送请求，非 2xx 视为错误并带上响应内容
    async fn send(&self, endpoint: &str, builder: RequestBuilder) -> Result<Response> {
        let response = builder
            .send()
            .await
            .with_context(|| format!("API请求失败 ({})", endpoint))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("API返回错误响应 ({}): {} {}", endpoint, status, body);
        }
        Ok(response)
    }
}

#[async_trait]
impl DocumentService for GoogleWorkspace {
    async fn create_document(&self, title: &str) -> Result<String> {
        let builder = self
            .request(Method::POST, DOCS_API)
            .await?
            .json(&doc_requests::new_document(title));
        let created: CreatedDocument = self.send("documents.create", builder).await?.json().await?;
        created.document_id.context("创建文档失败：响应中没有 documentId")
    }

    async fn end_index(&self, document_id: &str) -> Result<i64> {
        let url = format!("{}/{}", DOCS_API, document_id);
        let builder = self.request(Method::GET, &url).await?;
        let document: Value = self.send("documents.get", builder).await?.json().await?;
        Ok(doc_requests::end_index_of(&document))
    }

    async fn batch_update(&self, document_id: &str, requests: Vec<Value>) -> Result<()> {
        let url = format!("{}/{}:batchUpdate", DOCS_API, document_id);
        debug!("batchUpdate: {} 个请求", requests.len());
        let builder = self
            .request(Method::POST, &url)
            .await?
            .json(&json!({ "requests": requests }));
        self.send("documents.batchUpdate", builder).await?;
        Ok(())
    }

    async fn make_public(&self, file_id: &str) -> Result<()> {
        let url = format!("{}/{}/permissions", DRIVE_API, file_id);
        let builder = self
            .request(Method::POST, &url)
            .await?
            .json(&json!({ "role": "reader", "type": "anyone" }));
        self.send("permissions.create", builder).await?;
        Ok(())
    }

    async fn upload_file(&self, upload: &FileUpload) -> Result<String> {
        let media = tokio::fs::read(&upload.path)
            .await
            .with_context(|| format!("无法读取待上传文件: {}", upload.path.display()))?;
        let metadata = json!({ "name": upload.name, "parents": [upload.parent_folder] });
        let boundary = format!("upload-{}", uuid::Uuid::new_v4().simple());
        let body = multipart_related(&boundary, &metadata, &upload.mime_type, &media)?;

        let url = format!("{}?uploadType=multipart&fields=id", DRIVE_UPLOAD_API);
        let builder = self
            .request(Method::POST, &url)
            .await?
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={}", boundary),
            )
            .body(body);
        let created: CreatedFile = self.send("files.create", builder).await?.json().await?;
        created.id.context("上传失败：响应中没有文件 id")
    }

    async fn delete_file(&self, file_id: &str) -> Result<()> {
        let url = format!("{}/{}", DRIVE_API, file_id);
        let builder = self.request(Method::DELETE, &url).await?;
        self.send("files.delete", builder).await?;
        Ok(())
    }

    async fn list_folder(&self, folder_id: &str) -> Result<Vec<RemoteFile>> {
        let query = format!("'{}' in parents and trashed = false", folder_id);
        let mut files = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut params = vec![
                ("q", query.clone()),
                ("fields", "nextPageToken, files(id, name)".to_string()),
                ("pageSize", "100".to_string()),
            ];
            if let Some(token) = &page_token {
                params.push(("pageToken", token.clone()));
            }
            let builder = self.request(Method::GET, DRIVE_API).await?.query(&params);
            let page: FileList = self.send("files.list", builder).await?.json().await?;
            files.extend(page.files.into_iter().map(|f| RemoteFile {
                id: f.id,
                name: f.name,
            }));
            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(files)
    }

    async fn export_pdf(&self, document_id: &str) -> Result<Vec<u8>> {
        let url = format!("{}/{}/export", DRIVE_API, document_id);
        let builder = self
            .request(Method::GET, &url)
            .await?
            .query(&[("mimeType", "application/pdf")]);
        let bytes = self.send("files.export", builder).await?.bytes().await?;
        Ok(bytes.to_vec())
    }
}

/// 拼接 Drive 分段上传的 multipart/related 请求体
fn multipart_related(
    boundary: &str,
    metadata: &Value,
    mime_type: &str,
    media: &[u8],
) -> Result<Vec<u8>> {
    let mut body = Vec::with_capacity(media.len() + 512);
    body.extend_from_slice(
        format!(
            "--{b}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{meta}\r\n--{b}\r\nContent-Type: {mime}\r\n\r\n",
            b = boundary,
            meta = serde_json::to_string(metadata)?,
            mime = mime_type
        )
        .as_bytes(),
    );
    body.extend_from_slice(media);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    Ok(body)
}
