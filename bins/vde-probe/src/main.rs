//! vde-probe - H.264 slice 头与 DPB 探测工具
//!
//! 读取 Annex B 码流, 逐帧解析 slice 头并维护参考帧缓冲,
//! 由软件引擎校验交给解码引擎的参考列表, 输出每帧摘要.

mod logging;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{ArgAction, Parser, ValueEnum};
use serde::Serialize;

use vde_codec::h264::{
    DecodedFrame, DecoderConfig, H264Decoder, H264Error, SoftwareEngine, UnderfillPolicy,
};

/// 参考列表长度不足时的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum UnderfillArg {
    Reject,
    RepeatLast,
}

impl From<UnderfillArg> for UnderfillPolicy {
    fn from(arg: UnderfillArg) -> Self {
        match arg {
            UnderfillArg::Reject => Self::Reject,
            UnderfillArg::RepeatLast => Self::RepeatLast,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "vde-probe", version, about = "H.264 slice 头与 DPB 探测工具")]
struct Cli {
    /// 输入 Annex B 码流文件
    input: PathBuf,

    /// 解码器配置文件 (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 覆盖配置中的 ref_list_underfill
    #[arg(long, value_enum)]
    underfill: Option<UnderfillArg>,

    /// 每个 slice 头解析后以 info 级别输出 DPB
    #[arg(long)]
    dump_dpb: bool,

    /// 输出 JSON 格式
    #[arg(long)]
    json: bool,

    /// 日志目录
    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,

    /// 日志级别 (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

/// JSON 输出
#[derive(Debug, Serialize)]
struct ProbeOutput {
    file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sequence: Option<SequenceInfo>,
    frames: Vec<DecodedFrame>,
}

/// 活动 SPS 摘要
#[derive(Debug, Serialize)]
struct SequenceInfo {
    profile_idc: u8,
    level_idc: u8,
    width: u32,
    height: u32,
    max_num_ref_frames: u32,
    poc_type: u32,
}

/// 读取配置文件, 未指定时使用默认配置
fn load_config(path: Option<&Path>) -> anyhow::Result<DecoderConfig> {
    let Some(path) = path else {
        return Ok(DecoderConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("读取配置文件失败: {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("解析配置文件失败: {}", path.display()))
}

/// 命令行参数覆盖配置文件
fn build_config(cli: &Cli) -> anyhow::Result<DecoderConfig> {
    let mut config = load_config(cli.config.as_deref())?;
    if let Some(underfill) = cli.underfill {
        config.ref_list_underfill = underfill.into();
    }
    if cli.dump_dpb {
        config.dump_dpb = true;
    }
    Ok(config)
}

fn sequence_info(decoder: &H264Decoder) -> Option<SequenceInfo> {
    decoder.active_sps().map(|sps| {
        let (width, height) = sps.coded_size();
        SequenceInfo {
            profile_idc: sps.profile_idc,
            level_idc: sps.level_idc,
            width,
            height,
            max_num_ref_frames: sps.max_num_ref_frames,
            poc_type: sps.poc_type,
        }
    })
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = build_config(cli)?;
    log::debug!("解码器配置: {:?}", config);
    let data = std::fs::read(&cli.input)
        .with_context(|| format!("读取输入文件失败: {}", cli.input.display()))?;

    let mut decoder = H264Decoder::new(config);
    let mut engine = SoftwareEngine::new();
    let frames = match decoder.decode_annex_b(data, &mut engine) {
        Ok(frames) => frames,
        Err(err @ H264Error::Unimplemented(_)) => {
            return Err(err).context(format!(
                "码流使用了未实现的功能, 已解码 {} 帧",
                decoder.frames_decoded()
            ));
        }
        Err(err) => {
            return Err(err).context(format!(
                "解码失败, 已解码 {} 帧",
                decoder.frames_decoded()
            ));
        }
    };

    if cli.json {
        let output = ProbeOutput {
            file: cli.input.display().to_string(),
            sequence: sequence_info(&decoder),
            frames,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    if let Some(seq) = sequence_info(&decoder) {
        println!(
            "sequence: profile={} level={} {}x{} max_num_ref_frames={} poc_type={}",
            seq.profile_idc,
            seq.level_idc,
            seq.width,
            seq.height,
            seq.max_num_ref_frames,
            seq.poc_type
        );
    }
    for frame in &frames {
        println!(
            "frame #{:<5} {:<2} frame_num={:<5} poc={:<6} ref={} idr={} dpb_size={}",
            frame.index,
            frame.slice_type,
            frame.frame_num,
            frame.pic_order_cnt,
            u8::from(frame.reference),
            u8::from(frame.idr),
            frame.dpb_size
        );
    }
    println!("共解码 {} 帧", frames.len());
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(err) = logging::init(&cli.log_dir, "vde-probe", cli.verbose) {
        eprintln!("警告: {err:#}");
    }

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{:#}", err);
            eprintln!("错误: {err:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn cli_with(args: &[&str]) -> Cli {
        let mut argv = vec!["vde-probe", "input.h264"];
        argv.extend_from_slice(args);
        Cli::parse_from(argv)
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("创建临时文件失败");
        write!(file, r#"{{"dump_dpb": true, "aux_buffers": "never"}}"#).expect("写入失败");

        let config = load_config(Some(file.path())).expect("读取配置失败");
        assert!(config.dump_dpb);
        assert_eq!(config.aux_buffers, vde_codec::h264::AuxBufferPolicy::Never);
        assert_eq!(config.ref_list_underfill, UnderfillPolicy::Reject);
    }

    #[test]
    fn test_load_config_invalid_json() {
        let mut file = tempfile::NamedTempFile::new().expect("创建临时文件失败");
        write!(file, "{{ not json").expect("写入失败");
        let err = match load_config(Some(file.path())) {
            Ok(_) => panic!("非法 JSON 应失败"),
            Err(err) => err,
        };
        assert!(
            format!("{err:#}").contains("解析配置文件失败"),
            "错误信息应包含上下文, actual={err:#}"
        );
    }

    #[test]
    fn test_load_config_missing_file() {
        let dir = tempfile::tempdir().expect("创建临时目录失败");
        let path = dir.path().join("missing.json");
        assert!(load_config(Some(&path)).is_err(), "文件不存在时应失败");
    }

    #[test]
    fn test_cli_overrides_config() {
        let mut file = tempfile::NamedTempFile::new().expect("创建临时文件失败");
        write!(file, r#"{{"ref_list_underfill": "reject"}}"#).expect("写入失败");
        let path = file.path().to_string_lossy().to_string();

        let cli = cli_with(&["--config", &path, "--underfill", "repeat-last", "--dump-dpb"]);
        let config = build_config(&cli).expect("构造配置失败");
        assert_eq!(config.ref_list_underfill, UnderfillPolicy::RepeatLast);
        assert!(config.dump_dpb);
    }

    #[test]
    fn test_run_reports_missing_input() {
        let dir = tempfile::tempdir().expect("创建临时目录失败");
        let input = dir.path().join("none.h264");
        let log_dir = dir.path().join("logs");
        let cli = Cli::parse_from([
            "vde-probe",
            input.to_str().expect("路径应为 UTF-8"),
            "--log-dir",
            log_dir.to_str().expect("路径应为 UTF-8"),
        ]);
        let err = match run(&cli) {
            Ok(_) => panic!("输入文件不存在时应失败"),
            Err(err) => err,
        };
        assert!(format!("{err:#}").contains("读取输入文件失败"));
    }
}
