//! 日志系统.
//!
//! 控制台与文件双输出, 文件按日期命名 (`{prefix}.{YYYY-MM-DD}.log`), 跨天写入时自动切换.
//! 初始化时清理超出保留期的历史文件, 并按配置压缩更早日期的日志.
//! 库 crate 通过 `log` 门面输出的记录同样进入本订阅器.

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::{Duration, Instant};
use tracing_subscriber::{
    EnvFilter, Registry,
    fmt::{self, FormatEvent, FormatFields, format::Writer},
    layer::{Layer, SubscriberExt},
    registry::LookupSpan,
    util::SubscriberInitExt,
};

mod maintenance;

/// 两次日期检查的最小间隔
const DATE_CHECK_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// 文件日志级别 (EnvFilter 语法)
    pub level: String,
    pub directory: String,
    pub file_prefix: String,
    /// 控制台日志级别
    #[serde(default = "default_console_level")]
    pub console_level: String,
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
    #[serde(default = "default_true")]
    pub compress_history: bool,
}

fn default_true() -> bool {
    true
}

fn default_retention_days() -> i64 {
    30
}

fn default_console_level() -> String {
    "info".to_string()
}

static LOG_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

/// 注册全局日志订阅器, 进程内只能成功一次
pub fn init(config: LoggingConfig) -> Result<()> {
    std::fs::create_dir_all(&config.directory)
        .with_context(|| format!("创建日志目录失败, dir={}", config.directory))?;

    let console_filter = EnvFilter::try_new(&config.console_level)
        .with_context(|| format!("控制台日志级别无效, level={}", config.console_level))?;
    let file_filter = EnvFilter::try_new(&config.level)
        .with_context(|| format!("文件日志级别无效, level={}", config.level))?;

    let cleanup = maintenance::cleanup_logs(&config);
    let (non_blocking, guard) = tracing_appender::non_blocking(DailyFileWriter::new(config)?);

    Registry::default()
        .with(
            fmt::Layer::default()
                .with_writer(std::io::stdout)
                .with_ansi(true)
                .event_format(LineFormatter)
                .with_filter(console_filter),
        )
        .with(
            fmt::Layer::default()
                .with_writer(non_blocking)
                .with_ansi(false)
                .event_format(LineFormatter)
                .with_filter(file_filter),
        )
        .try_init()
        .context("注册全局日志订阅器失败")?;
    LOG_GUARD.set(guard).ok();

    if let Err(err) = cleanup {
        tracing::error!("启动时清理日志失败: {}", err);
    }
    Ok(())
}

// ============================================================
// 按日期切换的文件写入
// ============================================================

/// 写入当天日志文件, 日期变化时切换文件并整理历史
///
/// 日期每秒至多检查一次.
struct DailyFileWriter {
    config: LoggingConfig,
    date: NaiveDate,
    next_check: Instant,
    file: File,
}

impl DailyFileWriter {
    fn new(config: LoggingConfig) -> Result<Self> {
        let date = Local::now().date_naive();
        let file = open_append_file(&config, date)?;
        Ok(Self {
            config,
            date,
            next_check: Instant::now() + DATE_CHECK_INTERVAL,
            file,
        })
    }

    fn check_date(&mut self) -> std::io::Result<()> {
        let now = Instant::now();
        if now < self.next_check {
            return Ok(());
        }
        self.next_check = now + DATE_CHECK_INTERVAL;
        self.switch_to(Local::now().date_naive())
    }

    fn switch_to(&mut self, date: NaiveDate) -> std::io::Result<()> {
        if date == self.date {
            return Ok(());
        }
        let file = open_append_file(&self.config, date).map_err(std::io::Error::other)?;
        self.file.flush()?;
        self.file = file;
        self.date = date;
        if let Err(err) = maintenance::cleanup_logs(&self.config) {
            eprintln!("日志切换后清理失败: {err}");
        }
        Ok(())
    }
}

impl Write for DailyFileWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.check_date()?;
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.file.flush()
    }
}

fn open_append_file(config: &LoggingConfig, date: NaiveDate) -> Result<File> {
    let path = build_current_log_path(Path::new(&config.directory), &config.file_prefix, date);
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("打开日志文件失败, path={}", path.display()))
}

pub(crate) fn build_current_log_path(directory: &Path, prefix: &str, date: NaiveDate) -> PathBuf {
    directory.join(format!("{}.{}.log", prefix, date.format("%Y-%m-%d")))
}

// ============================================================
// 行格式
// ============================================================

/// `[MM-DD HH:MM:SS.mmm] LEVEL target > 消息`, 控制台按级别着色
struct LineFormatter;

impl<S, N> FormatEvent<S, N> for LineFormatter
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &fmt::FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let meta = event.metadata();
        let level = meta.level().as_str();
        write!(writer, "[{}] ", Local::now().format("%m-%d %H:%M:%S%.3f"))?;
        if writer.has_ansi_escapes() {
            let color = match *meta.level() {
                tracing::Level::ERROR => "31",
                tracing::Level::WARN => "33",
                tracing::Level::INFO => "32",
                _ => "34",
            };
            write!(writer, "\x1b[{color}m{level:5}\x1b[0m ")?;
        } else {
            write!(writer, "{level:5} ")?;
        }
        write!(writer, "{} > ", meta.target())?;
        ctx.format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}
