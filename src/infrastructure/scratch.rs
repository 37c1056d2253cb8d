//! 单个任务的临时目录

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult};
use crate::models::StockTarget;

const OVERVIEW_DIR: &str = "Moneycontrol";
const CHART_DIR: &str = "TradingView";
const REPORT_DIR: &str = "Stock Report";
const USER_IMAGE_FILE: &str = "user_uploaded_image.png";

/// 任务临时目录
///
/// ```text
/// <root>/<名称>-<时间戳>-<随机后缀>/
///     Moneycontrol/
///     TradingView/
///     Stock Report/
/// ```
#[derive(Debug, Clone)]
pub struct ScratchDir {
    base: PathBuf,
}

impl ScratchDir {
    /// 创建目录树
    pub async fn create(root: impl AsRef<Path>, target: &StockTarget) -> AppResult<Self> {
        let folder = format!(
            "{}-{}-{}",
            sanitize_folder_name(&target.name),
            chrono::Local::now().format("%Y-%m-%d_%H-%M-%S"),
            &uuid::Uuid::new_v4().simple().to_string()[..8]
        );
        let scratch = Self {
            base: root.as_ref().join(folder),
        };

        scratch
            .build(&[
                scratch.overview_dir(),
                scratch.chart_dir(),
                scratch.report_dir(),
            ])
            .await?;

        debug!("已创建临时目录: {}", scratch.base.display());
        Ok(scratch)
    }

    /// 依次创建子目录，中途失败时删掉已建好的部分
    async fn build(&self, dirs: &[PathBuf]) -> AppResult<()> {
        for dir in dirs {
            if let Err(e) = fs::create_dir_all(dir).await {
                self.remove().await;
                return Err(AppError::file(dir.display().to_string(), e));
            }
        }
        Ok(())
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn overview_dir(&self) -> PathBuf {
        self.base.join(OVERVIEW_DIR)
    }

    pub fn chart_dir(&self) -> PathBuf {
        self.base.join(CHART_DIR)
    }

    pub fn report_dir(&self) -> PathBuf {
        self.base.join(REPORT_DIR)
    }

    /// 保存用户上传的图片
    pub async fn save_user_image(&self, bytes: &[u8]) -> AppResult<PathBuf> {
        let path = self.base.join(USER_IMAGE_FILE);
        fs::write(&path, bytes)
            .await
            .map_err(|e| AppError::file(path.display().to_string(), e))?;
        info!("🖼️ 用户图片已保存: {}", path.display());
        Ok(path)
    }

    /// 删除整个目录树，失败只记日志
    ///
    /// 返回目录是否已不存在
    pub async fn remove(&self) -> bool {
        match fs::remove_dir_all(&self.base).await {
            Ok(()) => {
                info!("🧹 已删除临时目录: {}", self.base.display());
                true
            }
            Err(e) if e.kind() == ErrorKind::NotFound => true,
            Err(e) => {
                warn!("⚠️ 删除临时目录失败 ({}): {}", self.base.display(), e);
                false
            }
        }
    }
}

/// 只保留字母数字、空格、点、下划线和连字符
pub fn sanitize_folder_name(name: &str) -> String {
    static UNSAFE: OnceLock<Regex> = OnceLock::new();
    let re = UNSAFE.get_or_init(|| Regex::new(r"[^\w .-]+").expect("valid regex"));
    let cleaned = re.replace_all(name.trim(), "_");
    if cleaned.is_empty() {
        "job".to_string()
    } else {
        cleaned.into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_folder_name() {
        assert_eq!(sanitize_folder_name("Tata Motors"), "Tata Motors");
        assert_eq!(sanitize_folder_name("M&M/Fin"), "M_M_Fin");
        assert_eq!(sanitize_folder_name("  "), "job");
    }

    #[tokio::test]
    async fn test_create_then_remove() {
        let root = tempfile::tempdir().unwrap();
        let target = StockTarget::new("Infosys", None);

        let scratch = ScratchDir::create(root.path(), &target).await.unwrap();
        assert!(scratch.overview_dir().is_dir());
        assert!(scratch.chart_dir().is_dir());
        assert!(scratch.report_dir().is_dir());

        let image = scratch.save_user_image(b"\x89PNG").await.unwrap();
        assert!(image.is_file());

        assert!(scratch.remove().await);
        assert!(!scratch.base().exists());
        // 再删一次也算成功
        assert!(scratch.remove().await);
    }

    #[tokio::test]
    async fn test_partial_tree_is_removed_on_failure() {
        let root = tempfile::tempdir().unwrap();
        let scratch = ScratchDir {
            base: root.path().join("Infosys-partial"),
        };

        // 第一个目录能建成，第二个路径非法
        let err = scratch
            .build(&[scratch.overview_dir(), scratch.base.join("bad\0name")])
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::File { .. }));
        assert!(!scratch.base().exists());
    }

    #[tokio::test]
    async fn test_same_name_gets_distinct_directories() {
        let root = tempfile::tempdir().unwrap();
        let target = StockTarget::new("Infosys", None);
        let a = ScratchDir::create(root.path(), &target).await.unwrap();
        let b = ScratchDir::create(root.path(), &target).await.unwrap();
        assert_ne!(a.base(), b.base());
    }
}
