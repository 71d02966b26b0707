//! 可增长码流缓冲区.
//!
//! 输入块追加到尾部, 引擎消费的字节从头部移除, 剩余字节保持原有顺序.
//! 容量按倍增方式增长, 不超过配置的上限; 增长失败时缓冲区内容与容量不变.

use avcs_core::{AvcError, AvcResult};

/// 码流缓冲区
#[derive(Debug, Clone, Default)]
pub struct StreamBuffer {
    data: Vec<u8>,
    max_capacity: usize,
}

impl StreamBuffer {
    /// 按初始容量分配缓冲区
    ///
    /// `initial` 超过 `max` 时按 `max` 分配.
    pub fn with_capacity(initial: usize, max: usize) -> AvcResult<Self> {
        let initial = initial.min(max);
        let mut data = Vec::new();
        data.try_reserve_exact(initial).map_err(|err| {
            AvcError::OutOfMemory(format!("码流缓冲区分配失败, capacity={initial}, err={err}"))
        })?;
        Ok(Self {
            data,
            max_capacity: max,
        })
    }

    /// 已缓冲的字节数
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// 当前容量
    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    /// 容量上限
    pub fn max_capacity(&self) -> usize {
        self.max_capacity
    }

    /// 全部未消费数据
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// 将 `chunk` 追加到尾部, 必要时倍增容量
    pub fn append(&mut self, chunk: &[u8]) -> AvcResult<()> {
        let len = self.data.len();
        let needed = len.checked_add(chunk.len()).ok_or_else(|| {
            AvcError::OutOfMemory(format!("码流缓冲区长度溢出, len={len}, chunk={}", chunk.len()))
        })?;

        if needed > self.data.capacity() {
            let target = self.grow_target(needed)?;
            self.data.try_reserve_exact(target - len).map_err(|err| {
                AvcError::OutOfMemory(format!(
                    "码流缓冲区扩容失败, capacity={}, target={target}, err={err}",
                    self.data.capacity()
                ))
            })?;
        }

        self.data.extend_from_slice(chunk);
        Ok(())
    }

    /// 计算容纳 `needed` 字节的新容量: 反复倍增, 受上限约束
    fn grow_target(&self, needed: usize) -> AvcResult<usize> {
        if needed > self.max_capacity {
            return Err(AvcError::OutOfMemory(format!(
                "码流缓冲区超出容量上限, needed={needed}, max={}",
                self.max_capacity
            )));
        }
        let mut target = self.data.capacity().max(1);
        while target < needed {
            target = match target.checked_mul(2) {
                Some(v) => v,
                None => needed,
            };
        }
        Ok(target.min(self.max_capacity))
    }

    /// 移除头部 `consumed` 字节, 剩余数据移动到偏移 0
    pub fn compact(&mut self, consumed: usize) -> AvcResult<()> {
        if consumed > self.data.len() {
            return Err(AvcError::InvalidArgument(format!(
                "移除字节数超过缓冲长度, consumed={consumed}, len={}",
                self.data.len()
            )));
        }
        self.discard_front(consumed);
        Ok(())
    }

    /// 移除头部至多 `n` 字节, 返回实际移除的字节数
    pub(crate) fn discard_front(&mut self, n: usize) -> usize {
        let n = n.min(self.data.len());
        if n == self.data.len() {
            self.data.clear();
        } else if n > 0 {
            self.data.drain(..n);
        }
        n
    }

    /// 丢弃一个头部字节, 用于失步恢复
    ///
    /// 缓冲区为空时返回 false.
    pub fn skip_byte(&mut self) -> bool {
        self.discard_front(1) == 1
    }

    /// 清空数据, 保留容量
    pub fn reset(&mut self) {
        self.data.clear();
    }

    /// 释放存储
    pub fn release(&mut self) {
        self.data = Vec::new();
    }
}
