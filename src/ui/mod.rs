// 终端界面 - 首页、拍摄、分析中、结果页的文本渲染

pub mod command;

pub use command::{parse_command, parse_confirmation, ParseError, UiCommand};

use std::fmt::Write as _;

use crate::event_bus::AppEvent;
use crate::flow::{FlowError, ReviewView, ViewModel};
use crate::llm::EstimationErrorKind;
use crate::models::MeasurementRecord;

pub const DELETE_PROMPT: &str = "정말 삭제하시겠습니까? (y/n)";

const RULE: &str = "----------------------------------------";

pub fn render(view: &ViewModel) -> String {
    match view {
        ViewModel::Home { recent, total } => render_home(recent, *total),
        ViewModel::Capture { live, error, guide } => {
            let mut out = String::from("=== 카메라 ===\n");
            match (live, error) {
                (_, Some(message)) => {
                    let _ = writeln!(out, "{}", message);
                    out.push_str("[back] 돌아가기\n");
                }
                (true, None) => {
                    let _ = writeln!(
                        out,
                        "[ 가이드 {}% x {}% ] {}",
                        (guide.width_ratio * 100.0).round(),
                        (guide.height_ratio * 100.0).round(),
                        guide.hint
                    );
                    out.push_str("[shoot] 촬영   [back] 취소\n");
                }
                (false, None) => {
                    out.push_str("카메라를 준비하고 있습니다...\n");
                    out.push_str("[back] 취소\n");
                }
            }
            out
        }
        ViewModel::Processing => {
            "AI가 창문 사이즈를 분석하고 있습니다...\n잠시만 기다려주세요. [back] 취소\n".to_string()
        }
        ViewModel::Review(review) => render_review(review),
    }
}

fn render_home(recent: &[MeasurementRecord], total: usize) -> String {
    let mut out = String::new();
    out.push_str("=== 스마트 창문 측정 ===\n");
    out.push_str("[camera] 카메라로 측정   [upload <파일>] 사진 업로드\n");
    out.push_str(RULE);
    out.push('\n');

    let _ = writeln!(out, "최근 측정 기록 (전체 {}개)", total);
    if recent.is_empty() {
        out.push_str("  저장된 측정 기록이 없습니다.\n");
    }
    for (i, record) in recent.iter().enumerate() {
        let _ = writeln!(
            out,
            "  {}. {} · {} x {} cm · {}",
            i + 1,
            record.location_name,
            record.width_cm,
            record.height_cm,
            record.short_time()
        );
    }
    if !recent.is_empty() {
        out.push_str("[open <번호>] 기록 보기   [delete <번호>] 삭제\n");
    }
    out
}

fn render_review(review: &ReviewView) -> String {
    let mut out = String::new();
    out.push_str(if review.editable {
        "=== 측정 결과 ===\n"
    } else {
        "=== 측정 기록 ===\n"
    });
    let _ = writeln!(out, "이미지: {} ({} bytes)", review.image_mime, review.image_len);
    let _ = writeln!(out, "가로: {} cm", review.width_cm);
    let _ = writeln!(out, "세로: {} cm", review.height_cm);
    let _ = writeln!(out, "AI 신뢰도: {}%", review.confidence_percent);
    if let Some(reasoning) = &review.reasoning {
        let _ = writeln!(out, "분석 근거: {}", reasoning);
    }

    let location = if review.location_name.trim().is_empty() {
        "(입력 안 됨)"
    } else {
        review.location_name.as_str()
    };
    let _ = writeln!(out, "위치: {}", location);
    if let Some(measured_at) = &review.measured_at {
        let _ = writeln!(out, "측정일시: {}", measured_at);
    }

    out.push_str(RULE);
    out.push('\n');
    if review.editable {
        out.push_str("[width <cm>] [height <cm>] [location <이름>]\n");
        out.push_str("[save] 저장   [share] 공유   [delete] 삭제   [back] 뒤로\n");
    } else {
        out.push_str("[share] 공유   [delete] 삭제   [back] 뒤로\n");
    }
    out
}

/// 事件对应的提示文本，界面快照由 render 处理
pub fn describe_event(event: &AppEvent) -> Option<String> {
    match event {
        AppEvent::StateChanged { .. }
        | AppEvent::AnalysisStarted { .. }
        | AppEvent::AnalysisCompleted { .. } => None,
        AppEvent::AnalysisFailed { kind, message } => {
            let mut text = format!("[!] {}", message);
            if *kind == EstimationErrorKind::Credential {
                text.push_str("\n    설정 파일의 api_key_env 항목과 환경 변수를 확인해주세요.");
            }
            Some(text)
        }
        AppEvent::RecordSaved { .. } => Some("저장되었습니다.".to_string()),
        AppEvent::RecordDeleted { .. } => Some("삭제되었습니다.".to_string()),
        AppEvent::Notification { message } => Some(message.clone()),
    }
}

/// 操作被拒绝时展示给用户的提示
pub fn error_message(error: &FlowError) -> String {
    match error {
        FlowError::Busy => "분석이 진행 중입니다. 잠시만 기다려주세요.".to_string(),
        FlowError::InvalidTransition { .. } => "지금 화면에서는 사용할 수 없는 명령입니다.".to_string(),
        FlowError::InvalidDimension(_) => "사이즈는 0보다 큰 숫자여야 합니다.".to_string(),
        FlowError::RecordNotFound(_) => "기록을 찾을 수 없습니다.".to_string(),
        FlowError::Capture(e) => e.user_message().to_string(),
        FlowError::Store(_) => "기록을 저장하지 못했습니다.".to_string(),
        FlowError::Unavailable => "앱이 응답하지 않습니다. 다시 실행해주세요.".to_string(),
    }
}

pub fn help_text() -> &'static str {
    "명령어:
  camera              카메라로 측정
  upload <파일>       사진 업로드
  shoot               촬영
  width <cm>          가로 수정
  height <cm>         세로 수정
  location <이름>     위치 입력
  save                저장
  share               공유
  delete              삭제 (결과 화면)
  delete <번호>       기록 삭제 (홈 화면)
  open <번호>         기록 보기
  provider <이름>     분석 서비스 변경 (gemini, qwen)
  lookup <on|off>     위치 자동 입력
  back                뒤로
  home                홈 화면
  quit                종료"
}
