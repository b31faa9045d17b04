pub trait TruncateWithEllipsis {
    fn truncate_with_ellipsis(self, max_len: usize) -> Self;
}

impl TruncateWithEllipsis for String {
    fn truncate_with_ellipsis(mut self, max_len: usize) -> Self {
        if let Some((index, _)) = self.char_indices().nth(max_len.saturating_sub(1)) {
            if self[index..].chars().count() > 1 {
                self.truncate(index);
                self.push('…');
            }
        }

        self
    }
}

pub fn format_duration(duration: u64) -> String {
    let hours = duration / 3600;
    let minutes = (duration / 60) % 60;
    let seconds = duration % 60;

    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}

pub fn check_prompt<S: AsRef<str>>(prompt: S) -> Option<&'static str> {
    let prompt = prompt.as_ref();
    if prompt.trim().is_empty() {
        Some("the prompt is empty.")
    } else if prompt.chars().count() > 512 {
        Some("this prompt is too long (>512).")
    } else if prompt.lines().count() > 4 {
        Some("this prompt has too many lines (>4).")
    } else {
        None
    }
}
