mod common;

use std::sync::Arc;

use common::{test_settings, write_file, FakeDocs, DOCUMENT_ID};
use stock_snapshot::clients::doc_requests::text_len;
use stock_snapshot::models::{Artifact, StockTarget};
use stock_snapshot::services::document_assembler::REPORT_LINK_LABEL;
use stock_snapshot::services::{AssemblyInput, DocumentAssembler, UploadLedger};
use tokio_test::assert_ok;

struct Fixture {
    _dir: tempfile::TempDir,
    target: StockTarget,
    artifacts: Vec<Artifact>,
    user_image: std::path::PathBuf,
    work_dir: std::path::PathBuf,
}

fn fixture(images: usize, with_pdf: bool) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let mut artifacts = Vec::new();
    if with_pdf {
        artifacts.push(Artifact::pdf(write_file(dir.path(), "report.pdf", b"%PDF-1.4")));
    }
    for i in 1..=images {
        artifacts.push(Artifact::image(write_file(
            dir.path(),
            &format!("shot_{}.png", i),
            b"PNG",
        )));
    }
    let user_image = write_file(dir.path(), "user_uploaded_image.png", b"PNG");
    let work_dir = dir.path().to_path_buf();
    Fixture {
        _dir: dir,
        target: StockTarget::new("Infosys", Some("INFY".into())),
        artifacts,
        user_image,
        work_dir,
    }
}

#[tokio::test]
async fn test_every_insertion_appends_at_document_end() {
    let docs = FakeDocs::new();
    let assembler = DocumentAssembler::new(Arc::new(docs.clone()), test_settings());
    let fx = fixture(3, true);
    let mut ledger = UploadLedger::default();

    let outcome = assert_ok!(
        assembler
            .assemble(
                AssemblyInput {
                    target: &fx.target,
                    artifacts: &fx.artifacts,
                    user_image: Some(&fx.user_image),
                    comment: "Watch Q3 margins",
                    work_dir: &fx.work_dir,
                },
                &mut ledger,
            )
            .await
    );

    assert_eq!(outcome.document_id, DOCUMENT_ID);
    assert_eq!(outcome.document_url, "https://docs.google.com/document/d/doc-1");

    // 备注 + 用户图片 + 报告链接 + 3 张截图
    let starts = docs.batch_starts();
    assert_eq!(starts.len(), 6);
    for (start, end) in starts {
        assert_eq!(start, end, "插入位置必须是当时的文档末尾");
    }

    // 第一次插入的是备注
    let batches = docs.batches();
    assert_eq!(
        batches[0][0].pointer("/insertText/text").and_then(|v| v.as_str()),
        Some("Watch Q3 margins\n\n")
    );
    // 用户图片单独起一页
    assert!(batches[1][0].get("insertPageBreak").is_some());
    assert!(batches[1][1].get("insertInlineImage").is_some());
}

#[tokio::test]
async fn test_page_break_after_every_second_image() {
    let docs = FakeDocs::new();
    let assembler = DocumentAssembler::new(Arc::new(docs.clone()), test_settings());
    let fx = fixture(4, false);
    let mut ledger = UploadLedger::default();

    assert_ok!(
        assembler
            .assemble(
                AssemblyInput {
                    target: &fx.target,
                    artifacts: &fx.artifacts,
                    user_image: None,
                    comment: "",
                    work_dir: &fx.work_dir,
                },
                &mut ledger,
            )
            .await
    );

    let breaks: Vec<bool> = docs
        .batches()
        .iter()
        .map(|batch| batch.iter().any(|r| r.get("insertPageBreak").is_some()))
        .collect();
    assert_eq!(breaks, vec![false, true, false, true]);

    // 空备注不插入任何内容
    assert!(docs.batches()[0][0].get("insertInlineImage").is_some());
}

#[tokio::test]
async fn test_report_link_covers_only_the_label() {
    let docs = FakeDocs::new();
    let assembler = DocumentAssembler::new(Arc::new(docs.clone()), test_settings());
    let fx = fixture(0, true);
    let mut ledger = UploadLedger::default();

    let outcome = assert_ok!(
        assembler
            .assemble(
                AssemblyInput {
                    target: &fx.target,
                    artifacts: &fx.artifacts,
                    user_image: None,
                    comment: "",
                    work_dir: &fx.work_dir,
                },
                &mut ledger,
            )
            .await
    );

    let url = outcome.report_pdf_url.expect("报告链接");
    let batch = &docs.batches()[0];
    let link = batch[1].get("updateTextStyle").unwrap();
    let start = link.pointer("/range/startIndex").unwrap().as_i64().unwrap();
    let end = link.pointer("/range/endIndex").unwrap().as_i64().unwrap();
    assert_eq!(end - start, text_len(REPORT_LINK_LABEL));
    assert_eq!(link.pointer("/textStyle/link/url").unwrap(), url.as_str());

    // PDF 上传到报告目录，不计入待删除的图片
    assert_eq!(docs.uploaded()[0].parent_folder, "reports-folder");
    assert!(ledger.is_empty());
}

#[tokio::test]
async fn test_uploaded_images_are_recorded_in_ledger() {
    let docs = FakeDocs::new();
    let assembler = DocumentAssembler::new(Arc::new(docs.clone()), test_settings());
    let fx = fixture(2, false);
    let mut ledger = UploadLedger::default();

    assert_ok!(
        assembler
            .assemble(
                AssemblyInput {
                    target: &fx.target,
                    artifacts: &fx.artifacts,
                    user_image: Some(&fx.user_image),
                    comment: "",
                    work_dir: &fx.work_dir,
                },
                &mut ledger,
            )
            .await
    );

    assert_eq!(ledger.image_ids(), ["file-1", "file-2", "file-3"]);
    for upload in docs.uploaded() {
        assert_eq!(upload.parent_folder, "images-folder");
        assert_eq!(upload.mime_type, "image/png");
    }
    // 图片在插入前都已公开
    assert!(ledger.image_ids().iter().all(|id| docs.public().contains(id)));
}

#[tokio::test]
async fn test_upload_recovers_within_retry_budget() {
    let docs = FakeDocs::new().failing_uploads(2);
    let assembler = DocumentAssembler::new(Arc::new(docs.clone()), test_settings());
    let fx = fixture(1, false);
    let mut ledger = UploadLedger::default();

    assert_ok!(
        assembler
            .assemble(
                AssemblyInput {
                    target: &fx.target,
                    artifacts: &fx.artifacts,
                    user_image: None,
                    comment: "",
                    work_dir: &fx.work_dir,
                },
                &mut ledger,
            )
            .await
    );
    assert_eq!(docs.upload_attempts(), 3);
    assert_eq!(ledger.image_ids().len(), 1);
}

#[tokio::test]
async fn test_upload_gives_up_after_max_attempts() {
    let docs = FakeDocs::new().failing_uploads(10);
    let assembler = DocumentAssembler::new(Arc::new(docs.clone()), test_settings());
    let fx = fixture(2, false);
    let mut ledger = UploadLedger::default();

    let err = assembler
        .assemble(
            AssemblyInput {
                target: &fx.target,
                artifacts: &fx.artifacts,
                user_image: None,
                comment: "",
                work_dir: &fx.work_dir,
            },
            &mut ledger,
        )
        .await
        .unwrap_err();

    assert_eq!(docs.upload_attempts(), 3);
    assert!(format!("{:#}", err).contains("已尝试 3 次"));
    assert!(ledger.is_empty());
}

#[tokio::test]
async fn test_export_uploads_document_pdf() {
    let docs = FakeDocs::new();
    let mut settings = test_settings();
    settings.export_pdf = true;
    let assembler = DocumentAssembler::new(Arc::new(docs.clone()), settings);
    let fx = fixture(1, false);
    let mut ledger = UploadLedger::default();

    let outcome = assert_ok!(
        assembler
            .assemble(
                AssemblyInput {
                    target: &fx.target,
                    artifacts: &fx.artifacts,
                    user_image: None,
                    comment: "",
                    work_dir: &fx.work_dir,
                },
                &mut ledger,
            )
            .await
    );

    assert!(outcome.exported_pdf_url.is_some());
    assert!(docs.calls().contains(&"export_pdf doc-1".to_string()));
    let exported = docs.uploaded().pop().unwrap();
    assert_eq!(exported.mime_type, "application/pdf");
    assert!(exported.name.starts_with("INFY-"));
}
