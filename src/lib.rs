// 智能窗户测量 - 拍摄或上传窗户照片，由视觉模型估算尺寸并保存记录

// 声明模块
pub mod actors;
pub mod app;
pub mod capture;
pub mod event_bus;
pub mod flow;
pub mod llm;
pub mod location;
pub mod logger;
pub mod models;
pub mod settings;
pub mod share;
pub mod storage;
pub mod ui;

pub use app::{start, App, AppOptions};
