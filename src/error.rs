use thiserror::Error;

/// 应用程序错误类型
///
/// 任务边界和 HTTP 层使用；服务内部仍然用 anyhow 传递上下文
#[derive(Debug, Error)]
pub enum AppError {
    /// 表单缺字段或字段非法
    #[error("请求参数错误: {0}")]
    InvalidRequest(String),

    /// 同一个股票已有任务在运行
    #[error("A job is already running for {name}")]
    JobConflict { name: String },

    /// 一张截图都没拿到
    #[error("No screenshots captured")]
    NoArtifacts,

    /// 缺少凭据文件等前置条件
    #[error("缺少前置条件: {0}")]
    MissingPrerequisite(String),

    /// 浏览器启动等顶层截图步骤失败
    #[error("截图失败: {0:#}")]
    Capture(anyhow::Error),

    /// 文档生成或上传失败
    #[error("文档生成失败: {0:#}")]
    Document(anyhow::Error),

    /// 本地文件操作失败
    #[error("文件操作失败 ({path}): {source}")]
    File {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// 任务超时
    #[error("任务超时 ({0} 秒)")]
    Timeout(u64),

    /// 其他错误
    #[error("{0}")]
    Other(String),
}

impl AppError {
    pub fn file(path: impl Into<String>, source: std::io::Error) -> Self {
        AppError::File {
            path: path.into(),
            source,
        }
    }
}

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
