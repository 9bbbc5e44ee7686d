use iocraft::prelude::*;
use tokio::sync::watch;

use twup::{ProcessingState, UploadResult};

const BAR_WIDTH: usize = 30;

#[derive(Clone)]
pub struct UploadedMedia {
    pub name: String,
    pub media_id: String,
    pub state: Option<ProcessingState>,
    pub error: Option<String>,
}

impl UploadedMedia {
    pub fn new(name: &str, result: &UploadResult) -> Self {
        let error = result
            .processing_info
            .as_ref()
            .and_then(|info| info.error.as_ref())
            .and_then(|error| error.message.clone());
        Self {
            name: name.to_string(),
            media_id: result.media_id.to_string(),
            state: result.processing_info.as_ref().map(|info| info.state),
            error,
        }
    }
}

#[derive(Default, Props)]
pub struct UploadSummaryProps {
    pub title: String,
    pub media: Vec<UploadedMedia>,
}

#[derive(Default, Props)]
struct StatusIconProps {
    state: Option<ProcessingState>,
}

#[component]
fn StatusIcon(props: &StatusIconProps) -> impl Into<AnyElement<'static>> {
    match props.state {
        None | Some(ProcessingState::Succeeded) => element! {
            Text (
                color: Color::Green,
                content: "◆"
            )
        }
        .into_any(),
        Some(ProcessingState::Pending) | Some(ProcessingState::InProgress) => element! {
            Text (
                color: Color::Reset,
                content: "◇"
            )
        }
        .into_any(),
        Some(ProcessingState::Failed) => element! {
            Text (
                color: Color::Red,
                content: "▲"
            )
        }
        .into_any(),
        _ => element! {
            Text (
                color: Color::Yellow,
                content: "❓"
            )
        }
        .into_any(),
    }
}

#[derive(Default, Props)]
struct MediaEntryProps {
    media: Option<UploadedMedia>,
}

#[component]
fn MediaEntry(props: &MediaEntryProps) -> impl Into<AnyElement<'static>> {
    let Some(media) = props.media.as_ref() else {
        return element!(View()).into_any();
    };
    let detail = match (&media.state, &media.error) {
        (_, Some(error)) => format!("│ {}: {}", media.media_id, error),
        (Some(ProcessingState::Pending | ProcessingState::InProgress), None) => {
            format!("│ {} (processing)", media.media_id)
        }
        _ => format!("│ {}", media.media_id),
    };

    element! {
        View(flex_direction: FlexDirection::Column) {
            Text(content: "│")
            View(flex_direction: FlexDirection::Row) {
                StatusIcon(state: media.state)
                Text(weight: Weight::Bold, content: format!(" {}", &media.name))
            }
            Text(content: detail)
        }
    }
    .into_any()
}

#[component]
pub fn UploadSummary(props: &UploadSummaryProps) -> impl Into<AnyElement<'static>> {
    let ids = props
        .media
        .iter()
        .map(|media| media.media_id.as_str())
        .collect::<Vec<_>>()
        .join(",");

    element! {
        View(flex_direction: FlexDirection::Column) {
            View(flex_direction: FlexDirection::Row) {
                Text(content: "┌ ")
                View(background_color: Color::Blue) {
                    Text(content: &props.title, color: Color::White)
                }
            }
            #(props.media.clone().into_iter().map(|media| {
                element! {
                    MediaEntry(media: media)
                }
            }))
            Text(content: "│")
            View(flex_direction: FlexDirection::Row) {
                Text(content: "└ media_ids: ")
                Text(content: ids, weight: Weight::Bold)
            }
        }
    }
}

#[derive(Default, Props)]
pub struct ProgressBarProps {
    pub title: String,
    pub progress: Option<watch::Receiver<f32>>,
}

#[component]
pub fn ProgressBar(props: &ProgressBarProps, mut hooks: Hooks) -> impl Into<AnyElement<'static>> {
    let mut percent = hooks.use_state(|| 0.0f32);
    let progress = props.progress.clone();

    hooks.use_future(async move {
        if let Some(mut rx) = progress {
            while rx.changed().await.is_ok() {
                let value = *rx.borrow_and_update();
                percent.set(value.clamp(0.0, 100.0));
            }
        }
    });

    let value = percent.get();
    let filled = ((value / 100.0) * BAR_WIDTH as f32).round() as usize;
    let filled = filled.min(BAR_WIDTH);

    element! {
        View(flex_direction: FlexDirection::Row) {
            Spinner()
            Text(content: format!(" {} ", props.title))
            Text(content: "█".repeat(filled), color: Color::Cyan)
            Text(content: "░".repeat(BAR_WIDTH - filled), color: Color::DarkGrey)
            Text(content: format!(" {:>5.1}%", value))
        }
    }
}

#[component]
pub fn ConfigHeader() -> impl Into<AnyElement<'static>> {
    element! {
        View(flex_direction: FlexDirection::Column) {
            View(flex_direction: FlexDirection::Row) {
                Text(content: "┌ ")
                View(background_color: Color::Blue) {
                    Text(content: "twup configuration", color: Color::White)
                }
            }
            Text(content: "│ Press enter to accept a default value")
        }
    }
}

#[derive(Default, Props)]
pub struct InputPromptProps {
    pub prompt: String,
    pub default: Option<String>,
    pub description: Option<String>,
}

#[component]
pub fn InputPrompt(props: &InputPromptProps) -> impl Into<AnyElement<'static>> {
    element! {
        View(flex_direction: FlexDirection::Column) {
            View(flex_direction: FlexDirection::Row) {
                Text(content: "◇ ", color: Color::Cyan)
                Text(content: &props.prompt, weight: Weight::Bold)
                #(props.default.as_ref().map(|default| element! {
                    Text(content: format!(" [{}]", default), color: Color::DarkGrey)
                }))
            }
            #(props.description.as_ref().map(|description| element! {
                Text(content: format!("│ {}", description), color: Color::DarkGrey)
            }))
        }
    }
}

#[derive(Default, Props)]
pub struct MessageProps {
    pub message: String,
}

#[component]
pub fn ErrorMessage(props: &MessageProps) -> impl Into<AnyElement<'static>> {
    element! {
        View(flex_direction: FlexDirection::Row) {
            Text(content: "▲ ", color: Color::Red)
            Text(content: &props.message, color: Color::Red)
        }
    }
}

#[component]
pub fn SuccessMessage(props: &MessageProps) -> impl Into<AnyElement<'static>> {
    element! {
        View(flex_direction: FlexDirection::Row) {
            Text(content: "◆ ", color: Color::Green)
            Text(content: &props.message)
        }
    }
}

#[derive(Default, Props)]
pub struct SpinnerProps {
    pub color: Option<Color>,
}

#[component]
pub fn Spinner(props: &SpinnerProps, mut hooks: Hooks) -> impl Into<AnyElement<'static>> {
    let mut frame = hooks.use_state(|| 0usize);

    hooks.use_future(async move {
        loop {
            tokio::time::sleep(tokio::time::Duration::from_millis(250)).await;
            frame.set((frame.get() + 1) % 4);
        }
    });

    let spinner_chars = ["◐", "◓", "◑", "◒"];
    let current_char = spinner_chars[*frame.read()];
    let color = props.color.unwrap_or(Color::Cyan);

    element! {
        Text(content: current_char, color: color)
    }
}
