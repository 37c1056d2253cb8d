pub mod document_assembler;
pub mod document_service;
pub mod report_downloader;

pub use document_assembler::{AssemblyInput, AssemblySettings, DocumentAssembler, DocumentOutcome, UploadLedger};
pub use document_service::{DocumentService, FileUpload, RemoteFile};
pub use report_downloader::ReportDownloader;
