//! 解码器配置.

use crate::transform::TransformPreference;

/// 初始码流缓冲区容量 (512 KiB)
pub const DEFAULT_INITIAL_BUFFER_CAPACITY: usize = 512 * 1024;

/// 码流缓冲区容量上限 (256 MiB)
pub const DEFAULT_MAX_BUFFER_CAPACITY: usize = 256 * 1024 * 1024;

/// 帧内宏块错误隐藏方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConcealmentMethod {
    /// 以中性灰填充
    #[default]
    Gray,
    /// 以相邻宏块插值
    Neighbour,
}

impl ConcealmentMethod {
    /// 引擎使用的整数编码
    pub const fn code(self) -> u32 {
        match self {
            Self::Gray => 0,
            Self::Neighbour => 1,
        }
    }
}

/// 解码器配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoderConfig {
    /// 按解码顺序输出图像
    pub no_reorder: bool,
    /// 初始化时分配的码流缓冲区容量
    pub initial_buffer_capacity: usize,
    /// 码流缓冲区可增长到的最大容量
    pub max_buffer_capacity: usize,
    /// 反变换后端偏好
    pub transform: TransformPreference,
    /// 帧内错误隐藏方式
    pub concealment: ConcealmentMethod,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            no_reorder: false,
            initial_buffer_capacity: DEFAULT_INITIAL_BUFFER_CAPACITY,
            max_buffer_capacity: DEFAULT_MAX_BUFFER_CAPACITY,
            transform: TransformPreference::Auto,
            concealment: ConcealmentMethod::Gray,
        }
    }
}

impl DecoderConfig {
    pub fn with_no_reorder(mut self, no_reorder: bool) -> Self {
        self.no_reorder = no_reorder;
        self
    }

    pub fn with_initial_buffer_capacity(mut self, capacity: usize) -> Self {
        self.initial_buffer_capacity = capacity;
        self
    }

    pub fn with_max_buffer_capacity(mut self, capacity: usize) -> Self {
        self.max_buffer_capacity = capacity;
        self
    }

    pub fn with_transform(mut self, transform: TransformPreference) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_concealment(mut self, concealment: ConcealmentMethod) -> Self {
        self.concealment = concealment;
        self
    }
}
