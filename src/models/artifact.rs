//! 截图产物
//!
//! 一次任务按截图顺序产生的图片 / PDF 文件

use std::path::{Path, PathBuf};

use phf::phf_map;

/// 扩展名 → MIME 类型
static MIME_TYPES: phf::Map<&'static str, &'static str> = phf_map! {
    "png" => "image/png",
    "jpg" => "image/jpeg",
    "jpeg" => "image/jpeg",
    "webp" => "image/webp",
    "pdf" => "application/pdf",
};

/// 根据文件扩展名查找 MIME 类型（不区分大小写）
pub fn mime_type_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    MIME_TYPES.get(ext.as_str()).copied()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Image,
    Pdf,
}

/// 单个截图产物
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
    pub kind: ArtifactKind,
}

impl Artifact {
    pub fn image(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: ArtifactKind::Image,
        }
    }

    pub fn pdf(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: ArtifactKind::Pdf,
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self.kind {
            ArtifactKind::Pdf => "application/pdf",
            ArtifactKind::Image => mime_type_for(&self.path).unwrap_or("image/png"),
        }
    }
}
