//! User-facing text: progress indicators, reply captions, help strings, and
//! error rendering with bounded length.

use crate::error::Error;
use crate::request::GenerationRequest;

/// Upper bound on rendered error text shown to a user
pub const MAX_ERROR_TEXT: usize = 500;

/// Marker the upstream embeds in its generic backend-failure body
const UPSTREAM_BACKEND_MARKER: &str = "An error occured while generating the image";

/// Progress text shown while uploading the finished image
pub const UPLOADING: &str = "Generating... uploading the image";

/// Help text for the step-count command. The advertised cap of 60 is looser
/// than what is actually accepted; kept as-is because existing users know
/// this wording.
pub const STEPS_HELP: &str =
    "Send the step count after the command. Default is 28 steps, maximum is 60.";

/// Help text for the scale command
pub const SCALE_HELP: &str = "Send the scale (freedom) after the command, 0 <= scale <= 50.";

/// Size presets offered by the size menu as (width, height) pairs. The
/// larger ones bill paid credits upstream and pass `set_size` only on
/// deployments with a raised preset budget.
pub const SIZE_PRESETS: [(u32, u32); 6] = [
    (832, 1216),
    (1024, 1536),
    (1216, 832),
    (1536, 1024),
    (1024, 1024),
    (1472, 1472),
];

/// Progress text for a request with `ahead` unfinished tasks in front of it
pub fn queue_position_text(ahead: usize) -> String {
    if ahead == 0 {
        "Generating... processing your request".to_string()
    } else {
        format!("Generating... {ahead} task(s) ahead of you")
    }
}

/// Caption summarizing a resolved request, with paid-tier warnings on the
/// step count and size when they exceed the free allowance
pub fn caption(request: &GenerationRequest) -> String {
    let steps_warning = if request.uses_paid_steps() {
        " (paid tier)"
    } else {
        ""
    };
    let size_warning = if request.uses_paid_size() {
        " (paid tier)"
    } else {
        ""
    };

    format!(
        "Model: {}\nSeed: {}\nScale: {} Steps{}: {}\nSampler: {}\nSize{}: {}x{}",
        request.model,
        request.parameters.seed,
        request.parameters.scale,
        steps_warning,
        request.parameters.steps,
        request.parameters.sampler,
        size_warning,
        request.parameters.width,
        request.parameters.height,
    )
}

/// Render an error as user-facing text, truncated to [`MAX_ERROR_TEXT`]
pub fn render_error(error: &Error) -> String {
    match error {
        Error::RateLimited => {
            "The image API is rate limiting us, please try again in a moment.".to_string()
        }
        Error::Upstream { message, .. } if message.contains(UPSTREAM_BACKEND_MARKER) => {
            "The image API hit a backend error, please retry.".to_string()
        }
        Error::ExpiredArtifact(_) => {
            "That image has expired, please generate a new one.".to_string()
        }
        Error::NoPriorGeneration => "You have not generated an image yet.".to_string(),
        Error::Unauthorized => "You are not authorized.".to_string(),
        other => truncate_chars(&format!("Error: {other}"), MAX_ERROR_TEXT),
    }
}

/// Truncate to at most `max` characters, respecting char boundaries
pub(crate) fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((byte_index, _)) => text[..byte_index].to_string(),
        None => text.to_string(),
    }
}
