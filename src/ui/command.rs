// 命令解析 - 将一行输入转换为界面操作

use std::path::PathBuf;
use thiserror::Error;

use crate::models::ProviderKind;

#[derive(Debug, Clone, PartialEq)]
pub enum UiCommand {
    Camera,
    Upload(PathBuf),
    Shoot,
    Back,
    Width(f64),
    Height(f64),
    /// 空字符串表示清空位置
    Location(String),
    Save,
    Share,
    /// 结果页删除当前项；首页带序号删除列表中的记录
    Delete(Option<usize>),
    /// 首页列表中的序号（从 1 开始）
    Open(usize),
    /// 写入配置，下次启动生效
    Provider(ProviderKind),
    LocationLookup(bool),
    Home,
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("명령을 입력해주세요. (help: 도움말)")]
    Empty,
    #[error("알 수 없는 명령입니다: {0}")]
    Unknown(String),
    #[error("{0} 값을 입력해주세요.")]
    MissingArgument(&'static str),
    #[error("숫자가 아닙니다: {0}")]
    InvalidNumber(String),
    #[error("올바르지 않은 값입니다: {0}")]
    InvalidValue(String),
}

pub fn parse_command(line: &str) -> Result<UiCommand, ParseError> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let command = match word.to_lowercase().as_str() {
        "" => return Err(ParseError::Empty),
        "camera" | "카메라" => UiCommand::Camera,
        "upload" | "업로드" => {
            if rest.is_empty() {
                return Err(ParseError::MissingArgument("파일 경로"));
            }
            UiCommand::Upload(PathBuf::from(strip_quotes(rest)))
        }
        "shoot" | "shutter" | "촬영" => UiCommand::Shoot,
        "back" | "cancel" | "뒤로" | "취소" => UiCommand::Back,
        "width" | "가로" => UiCommand::Width(parse_number(rest, "가로")?),
        "height" | "세로" => UiCommand::Height(parse_number(rest, "세로")?),
        "location" | "위치" => UiCommand::Location(rest.to_string()),
        "save" | "저장" => UiCommand::Save,
        "share" | "공유" => UiCommand::Share,
        "delete" | "삭제" => {
            if rest.is_empty() {
                UiCommand::Delete(None)
            } else {
                UiCommand::Delete(Some(parse_index(rest)?))
            }
        }
        "open" | "열기" => UiCommand::Open(parse_index(rest)?),
        "provider" | "분석서비스" => {
            if rest.is_empty() {
                return Err(ParseError::MissingArgument("분석 서비스"));
            }
            let kind = rest
                .parse::<ProviderKind>()
                .map_err(|_| ParseError::InvalidValue(rest.to_string()))?;
            UiCommand::Provider(kind)
        }
        "lookup" | "위치조회" => match rest.to_lowercase().as_str() {
            "" => return Err(ParseError::MissingArgument("on/off")),
            "on" | "켜기" => UiCommand::LocationLookup(true),
            "off" | "끄기" => UiCommand::LocationLookup(false),
            other => return Err(ParseError::InvalidValue(other.to_string())),
        },
        "home" | "list" | "홈" => UiCommand::Home,
        "help" | "?" | "도움말" => UiCommand::Help,
        "quit" | "exit" | "종료" => UiCommand::Quit,
        _ => return Err(ParseError::Unknown(word.to_string())),
    };
    Ok(command)
}

/// 删除确认的回答
pub fn parse_confirmation(line: &str) -> bool {
    matches!(
        line.trim().to_lowercase().as_str(),
        "y" | "yes" | "예" | "네" | "ㅇ"
    )
}

/// 列表序号（从 1 开始）
fn parse_index(text: &str) -> Result<usize, ParseError> {
    if text.is_empty() {
        return Err(ParseError::MissingArgument("기록 번호"));
    }
    text.parse::<usize>()
        .ok()
        .filter(|n| *n > 0)
        .ok_or_else(|| ParseError::InvalidNumber(text.to_string()))
}

fn parse_number(text: &str, field: &'static str) -> Result<f64, ParseError> {
    if text.is_empty() {
        return Err(ParseError::MissingArgument(field));
    }
    let cleaned = text.trim_end_matches("cm").trim();
    cleaned
        .parse::<f64>()
        .map_err(|_| ParseError::InvalidNumber(text.to_string()))
}

fn strip_quotes(text: &str) -> &str {
    text.strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(text)
}
