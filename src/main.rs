use std::io::Write;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

use smart_window_lib::event_bus::AppEvent;
use smart_window_lib::flow::{FlowError, ViewModel};
use smart_window_lib::models::{ProviderKind, SettingsUpdate};
use smart_window_lib::share::ShareOutcome;
use smart_window_lib::ui::{self, UiCommand};
use smart_window_lib::{logger, App, AppOptions};

/// 창문 사진으로 가로/세로 사이즈를 측정하고 기록합니다
#[derive(Parser, Debug)]
#[command(name = "smart-window")]
#[command(about = "AI 창문 사이즈 측정")]
struct Args {
    /// 데이터 디렉터리 (기록, 설정, 로그)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// 설정 파일 경로 (기본값: <data-dir>/config.json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// 이번 실행에서 사용할 분석 서비스 (gemini, qwen)
    #[arg(long)]
    provider: Option<ProviderKind>,

    /// 터미널에 상세 로그 출력
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let options = AppOptions {
        data_dir: args.data_dir,
        config_path: args.config,
        provider: args.provider,
    };

    logger::init(
        &logger::default_log_dir(&options.resolved_data_dir()),
        args.verbose,
    )?;

    let app = smart_window_lib::start(options).await?;
    run_repl(&app).await
}

async fn run_repl(app: &App) -> Result<()> {
    let mut events = app.event_bus.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut pending_delete: Option<PendingDelete> = None;

    println!("{}", ui::render(&app.flow.snapshot().await?));
    prompt();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };

                if let Some(target) = pending_delete.take() {
                    let confirmed = ui::parse_confirmation(&line);
                    if !confirmed {
                        println!("삭제를 취소했습니다.");
                    }
                    match target {
                        PendingDelete::Current => report(app.flow.delete_current(confirmed).await),
                        PendingDelete::Record(id) => report(app.flow.delete(id, confirmed).await),
                    }
                    prompt();
                    continue;
                }

                match ui::parse_command(&line) {
                    Ok(UiCommand::Quit) => break,
                    Ok(command) => pending_delete = execute(app, command).await,
                    Err(ui::ParseError::Empty) => {}
                    Err(e) => println!("{}", e),
                }
                prompt();
            }

            event = events.recv() => match event {
                Ok(AppEvent::StateChanged { view }) => {
                    println!("\n{}", ui::render(&view));
                    prompt();
                }
                Ok(event) => {
                    if let Some(text) = ui::describe_event(&event) {
                        println!("\n{}", text);
                        prompt();
                    }
                }
                Err(RecvError::Lagged(n)) => tracing::warn!("界面事件积压，跳过 {} 条", n),
                Err(RecvError::Closed) => break,
            },
        }
    }

    // 退出前释放摄像头
    let _ = app.flow.cancel().await;
    println!("종료합니다.");
    Ok(())
}

/// 等待用户确认的删除
enum PendingDelete {
    /// 结果页上的当前项
    Current,
    /// 首页列表中的记录
    Record(String),
}

/// 执行一条命令，返回等待确认的删除
async fn execute(app: &App, command: UiCommand) -> Option<PendingDelete> {
    let flow = &app.flow;
    match command {
        UiCommand::Camera => report(flow.begin_capture().await),
        UiCommand::Upload(path) => report(flow.upload_file(path).await),
        UiCommand::Shoot => report(flow.shutter().await),
        UiCommand::Back | UiCommand::Home => report(flow.cancel().await),
        UiCommand::Width(value) => report(flow.set_width(value).await),
        UiCommand::Height(value) => report(flow.set_height(value).await),
        UiCommand::Location(name) => report(flow.set_location(name).await),
        UiCommand::Save => report(flow.save().await),
        UiCommand::Share => match flow.share().await {
            Ok((text, outcome)) => {
                if let Some(message) = outcome.user_message() {
                    println!("{}", message);
                }
                if outcome == ShareOutcome::Unavailable {
                    println!("{}", text);
                }
            }
            Err(e) => report::<()>(Err(e)),
        },
        UiCommand::Delete(None) => match flow.snapshot().await {
            Ok(ViewModel::Review(_)) => {
                println!("{}", ui::DELETE_PROMPT);
                return Some(PendingDelete::Current);
            }
            Ok(_) => println!("측정 결과 화면에서 사용하거나 번호를 함께 입력해주세요. (delete <번호>)"),
            Err(e) => report::<()>(Err(e)),
        },
        UiCommand::Delete(Some(index)) => match flow.snapshot().await {
            Ok(ViewModel::Home { recent, .. }) => match recent.get(index - 1) {
                Some(record) => {
                    println!("{} ({})", ui::DELETE_PROMPT, record.location_name);
                    return Some(PendingDelete::Record(record.id.clone()));
                }
                None => println!("{}번 기록이 없습니다.", index),
            },
            Ok(_) => println!("홈 화면에서 사용할 수 있습니다."),
            Err(e) => report::<()>(Err(e)),
        },
        UiCommand::Open(index) => match flow.snapshot().await {
            Ok(ViewModel::Home { recent, .. }) => match recent.get(index - 1) {
                Some(record) => report(flow.open(record.id.clone()).await),
                None => println!("{}번 기록이 없습니다.", index),
            },
            Ok(_) => println!("홈 화면에서 사용할 수 있습니다."),
            Err(e) => report::<()>(Err(e)),
        },
        UiCommand::Provider(kind) => {
            save_setting(
                app,
                SettingsUpdate {
                    llm_provider: Some(kind),
                    ..Default::default()
                },
            )
            .await
        }
        UiCommand::LocationLookup(enabled) => {
            save_setting(
                app,
                SettingsUpdate {
                    location_lookup: Some(enabled),
                    ..Default::default()
                },
            )
            .await
        }
        UiCommand::Help => println!("{}", ui::help_text()),
        UiCommand::Quit => {}
    }
    None
}

async fn save_setting(app: &App, update: SettingsUpdate) {
    match app.settings.update(update).await {
        Ok(_) => println!("설정을 저장했습니다. 다음 실행부터 적용됩니다."),
        Err(e) => {
            tracing::warn!("保存配置失败: {}", e);
            println!("설정을 저장하지 못했습니다.");
        }
    }
}

fn report<T>(result: Result<T, FlowError>) {
    if let Err(e) = result {
        tracing::debug!("命令被拒绝: {}", e);
        println!("{}", ui::error_message(&e));
    }
}

fn prompt() {
    print!("> ");
    let _ = std::io::stdout().flush();
}
