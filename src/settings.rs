use std::path::{Path, PathBuf};

use crate::canvas::{BrushConfig, format_hex_color, parse_hex_color};
use crate::components::history::HistoryStack;
use crate::components::text_overlay::TextDefaults;
use crate::io::ExportFormat;
use crate::ops::export::TextStyle;

const SETTINGS_FILE: &str = "wipe_settings.cfg";

/// User-tunable editor defaults, persisted as `key=value` lines.
#[derive(Clone, Debug, PartialEq)]
pub struct EditorSettings {
    pub brush_size: f32,
    pub brush_color: [u8; 3],
    pub preview_alpha: f32,

    pub text_font_size: f32,
    pub text_font_family: String,
    pub text_color: [u8; 3],
    pub text_default_content: String,
    pub text_default_x: f32,
    pub text_default_y: f32,

    /// Prepended to the source name of every export.
    pub export_prefix: String,
    pub export_format: ExportFormat,

    /// `0` = unbounded.
    pub max_history_steps: usize,
    /// `0` = unbounded.
    pub max_history_mb: usize,
}

impl Default for EditorSettings {
    fn default() -> Self {
        let brush = BrushConfig::default();
        let text = TextDefaults::default();
        Self {
            brush_size: brush.size,
            brush_color: brush.color,
            preview_alpha: brush.preview_alpha,
            text_font_size: text.font_size,
            text_font_family: text.font_family,
            text_color: TextStyle::default().color,
            text_default_content: text.content,
            text_default_x: text.x,
            text_default_y: text.y,
            export_prefix: "wiped_".to_string(),
            export_format: ExportFormat::Png,
            max_history_steps: 0,
            max_history_mb: 0,
        }
    }
}

impl EditorSettings {
    /// Path to the settings file.
    /// On Linux:   ~/.config/wipe/wipe_settings.cfg  (XDG_CONFIG_HOME respected)
    /// On Windows: %APPDATA%\Wipe\wipe_settings.cfg
    /// On macOS:   ~/Library/Application Support/Wipe/wipe_settings.cfg
    /// Fallback:   same directory as the executable.
    pub fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "linux")]
        {
            let config_dir = std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
                    PathBuf::from(home).join(".config")
                })
                .join("wipe");
            return Some(config_dir.join(SETTINGS_FILE));
        }
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA")
                .or_else(|_| std::env::var("USERPROFILE"))
                .ok()?;
            let config_dir = PathBuf::from(appdata).join("Wipe");
            return Some(config_dir.join(SETTINGS_FILE));
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
            let config_dir = PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("Wipe");
            return Some(config_dir.join(SETTINGS_FILE));
        }
        #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
        {
            std::env::current_exe().ok().and_then(|p| p.parent().map(|d| d.join(SETTINGS_FILE)))
        }
    }

    /// Load from the default location (defaults if missing or corrupt).
    pub fn load() -> Self {
        match Self::settings_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Save to the default location.
    pub fn save(&self) -> std::io::Result<PathBuf> {
        let path = Self::settings_path()
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "no settings directory"))?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::parse(&content),
            Err(_) => Self::default(),
        }
    }

    /// Write the file, creating its directory if needed.
    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(path, self.to_config_string())
    }

    pub fn to_config_string(&self) -> String {
        format!(
            "brush_size={}\n\
             brush_color={}\n\
             preview_alpha={}\n\
             text_font_size={}\n\
             text_font_family={}\n\
             text_color={}\n\
             text_default_content={}\n\
             text_default_x={}\n\
             text_default_y={}\n\
             export_prefix={}\n\
             export_format={}\n\
             max_history_steps={}\n\
             max_history_mb={}\n",
            self.brush_size,
            format_hex_color(self.brush_color),
            self.preview_alpha,
            self.text_font_size,
            self.text_font_family,
            format_hex_color(self.text_color),
            self.text_default_content.replace('\n', "\\n"),
            self.text_default_x,
            self.text_default_y,
            self.export_prefix,
            self.export_format.extension(),
            self.max_history_steps,
            self.max_history_mb,
        )
    }

    /// Unknown keys are skipped; a value that fails to parse keeps its default.
    pub fn parse(content: &str) -> Self {
        let mut s = Self::default();
        let d = Self::default();
        for line in content.lines() {
            let Some((key, val)) = line.split_once('=') else { continue };
            let key = key.trim();
            let val = val.trim();
            match key {
                "brush_size" => {
                    s.brush_size = val.parse().ok().filter(|v: &f32| *v > 0.0).unwrap_or(d.brush_size);
                }
                "brush_color" => {
                    s.brush_color = parse_hex_color(val).unwrap_or(d.brush_color);
                }
                "preview_alpha" => {
                    s.preview_alpha = val.parse::<f32>().map(|a| a.clamp(0.0, 1.0)).unwrap_or(d.preview_alpha);
                }
                "text_font_size" => {
                    s.text_font_size = val.parse().ok().filter(|v: &f32| *v > 0.0).unwrap_or(d.text_font_size);
                }
                "text_font_family" => {
                    if !val.is_empty() {
                        s.text_font_family = val.to_string();
                    }
                }
                "text_color" => {
                    s.text_color = parse_hex_color(val).unwrap_or(d.text_color);
                }
                "text_default_content" => {
                    s.text_default_content = val.replace("\\n", "\n");
                }
                "text_default_x" => {
                    s.text_default_x = val.parse().unwrap_or(d.text_default_x);
                }
                "text_default_y" => {
                    s.text_default_y = val.parse().unwrap_or(d.text_default_y);
                }
                "export_prefix" => {
                    s.export_prefix = val.to_string();
                }
                "export_format" => {
                    s.export_format = ExportFormat::from_name(val).unwrap_or(d.export_format);
                }
                "max_history_steps" => {
                    s.max_history_steps = val.parse().unwrap_or(0);
                }
                "max_history_mb" => {
                    s.max_history_mb = val.parse().unwrap_or(0);
                }
                _ => {}
            }
        }
        s
    }

    pub fn brush(&self) -> BrushConfig {
        BrushConfig {
            size: self.brush_size,
            color: self.brush_color,
            preview_alpha: self.preview_alpha,
        }
    }

    pub fn text_defaults(&self) -> TextDefaults {
        TextDefaults {
            content: self.text_default_content.clone(),
            x: self.text_default_x,
            y: self.text_default_y,
            font_size: self.text_font_size,
            font_family: self.text_font_family.clone(),
        }
    }

    pub fn text_style(&self) -> TextStyle {
        TextStyle { color: self.text_color, ..TextStyle::default() }
    }

    /// Fresh history honouring the configured limits.
    pub fn new_history(&self) -> HistoryStack {
        let max_bytes = (self.max_history_mb > 0).then(|| self.max_history_mb * 1024 * 1024);
        HistoryStack::with_limits(self.max_history_steps, max_bytes)
    }
}
