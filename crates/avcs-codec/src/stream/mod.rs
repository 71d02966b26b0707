//! 码流增量送入.
//!
//! - [`buffer`]: 可增长码流缓冲区, 负责追加, 头部移除与失步跳字节
//! - `driver`: 解码驱动循环, 解释引擎状态并决定移除多少字节
//! - [`dispatch`]: 将解码完成的图像逐帧交付给接收方

pub mod buffer;
pub mod dispatch;
pub(crate) mod driver;

#[cfg(test)]
mod tests;

pub use buffer::StreamBuffer;
pub use dispatch::{PictureDispatcher, PictureSink};
