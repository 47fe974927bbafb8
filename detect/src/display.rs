use crate::common::*;

/// Shows frames in a HighGUI window.
///
/// The window is created on the first frame.
#[derive(Debug)]
pub struct WindowSink {
    window_name: String,
    opened: bool,
}

impl WindowSink {
    pub fn new(window_name: impl Into<String>) -> Self {
        Self {
            window_name: window_name.into(),
            opened: false,
        }
    }
}

impl DisplaySink<Mat> for WindowSink {
    fn show(&mut self, frame: &Mat) -> Result<()> {
        if !self.opened {
            highgui::named_window(&self.window_name, highgui::WINDOW_AUTOSIZE)?;
            self.opened = true;
        }
        highgui::imshow(&self.window_name, frame)?;
        Ok(())
    }

    fn poll_key(&mut self) -> Result<Option<char>> {
        let key = highgui::wait_key(1)?;
        Ok(key_to_char(key))
    }

    fn close(&mut self) -> Result<()> {
        if self.opened {
            highgui::destroy_all_windows()?;
            self.opened = false;
        }
        Ok(())
    }
}

/// Converts a `wait_key` code to a character. Negative codes mean no key.
fn key_to_char(key: i32) -> Option<char> {
    (key >= 0).then(|| char::from((key & 0xFF) as u8))
}
