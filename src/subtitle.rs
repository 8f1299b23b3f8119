//! Word-level ASS subtitles from forced-alignment timings

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};

use crate::align::AlignedSegment;
use crate::error::Result;

/// Characters stripped from the end of words in word-only mode
const TRAILING_PUNCTUATION: &[char] = &[
    ')', ']', '}', '"', '\'', '\u{201D}', '\u{2019}', '\u{00BB}', '.', ',', '!', '?', ';', ':',
    '-', '\u{2013}', '\u{2014}', '\u{2026}',
];

/// How aligned words become subtitle events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum SubtitleMode {
    /// Full segment line with a highlight box moving over each spoken word
    #[default]
    SegmentOverlay,
    /// One uppercase word at a time
    WordOnly,
}

/// Fonts, colors and layout of the subtitle file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubtitleStyle {
    pub play_res_w: u32,
    pub play_res_h: u32,
    pub font: String,
    pub font_size: u32,
    pub primary_color: String,
    pub outline_color: String,
    /// Numpad-style ASS alignment; 5 is centered
    pub alignment: u8,
    pub margin_l: u32,
    pub margin_r: u32,
    pub margin_v: u32,
    pub highlight_bg_color: String,
    pub highlight_text_color: String,
    pub word_font_size: u32,
    /// Inline `\c` color for word-only text
    pub word_fill_color: String,
    /// Inline `\3c` color for word-only outlines
    pub word_outline_color: String,
    pub word_border: u32,
}

impl Default for SubtitleStyle {
    fn default() -> Self {
        Self {
            play_res_w: 1080,
            play_res_h: 1920,
            font: "DejaVu Sans Mono".to_string(),
            font_size: 54,
            primary_color: "&H00FFFFFF".to_string(),
            outline_color: "&H00111111".to_string(),
            alignment: 5,
            margin_l: 60,
            margin_r: 60,
            margin_v: 40,
            highlight_bg_color: "&H8033CCFF".to_string(),
            highlight_text_color: "&H00000000".to_string(),
            word_font_size: 72,
            word_fill_color: "&HFFFFFF&".to_string(),
            word_outline_color: "&H000000&".to_string(),
            word_border: 4,
        }
    }
}

impl SubtitleStyle {
    pub fn load(path: &Path) -> Result<Self> {
        crate::error::require_file("subtitle style", path)?;
        Ok(serde_json::from_str(&std::fs::read_to_string(path)?)?)
    }

    fn word_only_tags(&self) -> String {
        format!(
            "{{\\b1\\fs{}\\c{}\\3c{}\\bord{}\\shad0}}",
            self.word_font_size, self.word_fill_color, self.word_outline_color, self.word_border
        )
    }
}

/// Formats seconds as `H:MM:SS.CC`; negative times clamp to zero.
pub fn fmt_time(t: f64) -> String {
    let t = if t.is_finite() && t > 0.0 { t } else { 0.0 };
    // Round once on the centisecond grid so 59.996 carries into the next second
    let total_cs = (t * 100.0).round() as u64;
    let cs = total_cs % 100;
    let total_s = total_cs / 100;
    let s = total_s % 60;
    let m = (total_s / 60) % 60;
    let h = total_s / 3600;
    format!("{}:{:02}:{:02}.{:02}", h, m, s, cs)
}

/// Escapes ASS control characters in literal text.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '{' => out.push_str("\\{"),
            '}' => out.push_str("\\}"),
            '\n' => out.push_str("\\N"),
            _ => out.push(c),
        }
    }
    out
}

/// Word-only display form: uppercased, trailing punctuation removed.
fn word_only_text(word: &str) -> String {
    word.trim()
        .trim_end_matches(TRAILING_PUNCTUATION)
        .trim_end()
        .to_uppercase()
}

fn no_wrap(text: &str) -> String {
    format!("{{\\q2}}{}", text)
}

/// A single `Dialogue` line
#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleEvent {
    pub layer: u8,
    pub start: f64,
    pub end: f64,
    pub style: &'static str,
    pub margin_l: u32,
    pub margin_r: u32,
    pub margin_v: u32,
    /// Escaped text, including any override tags
    pub text: String,
}

impl SubtitleEvent {
    fn new(layer: u8, start: f64, end: f64, style_name: &'static str, style: &SubtitleStyle, text: String) -> Self {
        Self {
            layer,
            start,
            end,
            style: style_name,
            margin_l: style.margin_l,
            margin_r: style.margin_r,
            margin_v: style.margin_v,
            text,
        }
    }
}

impl fmt::Display for SubtitleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Dialogue:{},{},{},{},,{},{},{},,{}",
            self.layer,
            fmt_time(self.start),
            fmt_time(self.end),
            self.style,
            self.margin_l,
            self.margin_r,
            self.margin_v,
            self.text
        )
    }
}

/// Builds the events for `segments`, in the order the aligner produced them.
pub fn build_events(segments: &[AlignedSegment], style: &SubtitleStyle, mode: SubtitleMode) -> Vec<SubtitleEvent> {
    let events = match mode {
        SubtitleMode::SegmentOverlay => segment_overlay_events(segments, style),
        SubtitleMode::WordOnly => word_only_events(segments, style),
    };
    debug!("Built {} subtitle events ({:?})", events.len(), mode);
    events
}

fn segment_overlay_events(segments: &[AlignedSegment], style: &SubtitleStyle) -> Vec<SubtitleEvent> {
    let mut events = Vec::new();
    for seg in segments {
        let words: Vec<(&str, f64, f64)> = seg
            .words
            .iter()
            .filter_map(|w| w.times().map(|(start, end)| (w.word.trim(), start, end)))
            .filter(|(token, _, _)| !token.is_empty())
            .collect();
        if words.is_empty() {
            continue;
        }

        let tokens: Vec<&str> = words.iter().map(|(token, _, _)| *token).collect();
        let base_text = tokens.join(" ");
        events.push(SubtitleEvent::new(
            0,
            seg.start,
            seg.end,
            "Base",
            style,
            no_wrap(&escape(&base_text)),
        ));

        // Leading spaces put each highlight over its word in the base line
        let mut pad_len = 0;
        for (i, (token, start, end)) in words.iter().enumerate() {
            if i > 0 {
                pad_len += tokens[i - 1].chars().count() + 1;
            }
            let overlay = format!("{}{}", " ".repeat(pad_len), token);
            events.push(SubtitleEvent::new(
                1,
                *start,
                *end,
                "HL",
                style,
                no_wrap(&escape(&overlay)),
            ));
        }
    }
    events
}

fn word_only_events(segments: &[AlignedSegment], style: &SubtitleStyle) -> Vec<SubtitleEvent> {
    let tags = style.word_only_tags();
    segments
        .iter()
        .flat_map(|seg| seg.words.iter())
        .filter_map(|w| {
            let (start, end) = w.times()?;
            let text = word_only_text(&w.word);
            if text.is_empty() {
                return None;
            }
            Some(SubtitleEvent::new(
                0,
                start,
                end,
                "Base",
                style,
                format!("{}{}", tags, escape(&text)),
            ))
        })
        .collect()
}

/// The `[Script Info]`, `[V4+ Styles]` and `[Events]` header.
pub fn ass_header(style: &SubtitleStyle, mode: SubtitleMode) -> String {
    let mut header = format!(
        "[Script Info]\n\
         ScriptType: v4.00+\n\
         PlayResX:{}\n\
         PlayResY:{}\n\n\
         [V4+ Styles]\n\
         Format: Name, Fontname, Fontsize, PrimaryColour, SecondaryColour, OutlineColour, BackColour, \
         Bold, Italic, Underline, StrikeOut, ScaleX, ScaleY, Spacing, Angle, BorderStyle, Outline, \
         Shadow, Alignment, MarginL, MarginR, MarginV, Encoding\n",
        style.play_res_w, style.play_res_h
    );
    let base_size = match mode {
        SubtitleMode::SegmentOverlay => style.font_size,
        SubtitleMode::WordOnly => style.word_font_size,
    };
    header.push_str(&format!(
        "Style: Base,{},{},{},&H000000FF,{},&H64000000,0,0,0,0,100,100,0,0,1,3,0,{},{},{},{},1\n",
        style.font,
        base_size,
        style.primary_color,
        style.outline_color,
        style.alignment,
        style.margin_l,
        style.margin_r,
        style.margin_v
    ));
    if mode == SubtitleMode::SegmentOverlay {
        header.push_str(&format!(
            "Style: HL,{},{},{},&H000000FF,&H00000000,{},0,0,0,0,100,100,0,0,3,0,0,{},{},{},{},1\n",
            style.font,
            style.font_size,
            style.highlight_text_color,
            style.highlight_bg_color,
            style.alignment,
            style.margin_l,
            style.margin_r,
            style.margin_v
        ));
    }
    header.push_str(
        "\n[Events]\n\
         Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text\n",
    );
    header
}

/// The complete subtitle file.
pub fn render_ass(style: &SubtitleStyle, mode: SubtitleMode, events: &[SubtitleEvent]) -> String {
    let mut out = ass_header(style, mode);
    for event in events {
        out.push_str(&event.to_string());
        out.push('\n');
    }
    out
}

/// Writes the subtitle file atomically; a failed write leaves no partial file.
pub fn write_ass(path: &Path, style: &SubtitleStyle, mode: SubtitleMode, events: &[SubtitleEvent]) -> Result<()> {
    let contents = render_ass(style, mode, events);
    let dir = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => {
            std::fs::create_dir_all(parent)?;
            parent
        }
        None => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(contents.as_bytes())?;
    tmp.persist(path).map_err(|e| e.error)?;
    info!("Wrote {} subtitle events to {}", events.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align::WordToken;

    fn segment(words: Vec<WordToken>) -> AlignedSegment {
        let start = words.iter().filter_map(|w| w.start).fold(f64::MAX, f64::min);
        let end = words.iter().filter_map(|w| w.end).fold(0.0, f64::max);
        AlignedSegment {
            start,
            end,
            text: String::new(),
            words,
        }
    }

    #[test]
    fn test_fmt_time() {
        assert_eq!(fmt_time(0.0), "0:00:00.00");
        assert_eq!(fmt_time(1.4), "0:00:01.40");
        assert_eq!(fmt_time(61.25), "0:01:01.25");
        assert_eq!(fmt_time(-3.0), "0:00:00.00");
        assert_eq!(fmt_time(f64::NAN), "0:00:00.00");
    }

    #[test]
    fn test_fmt_time_rollover() {
        assert_eq!(fmt_time(3725.999), "1:02:06.00");
        assert_eq!(fmt_time(59.996), "0:01:00.00");
        assert_eq!(fmt_time(3599.999), "1:00:00.00");
        assert_eq!(fmt_time(0.994), "0:00:00.99");
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape(r"a {bold} b\c"), r"a \{bold\} b\\c");
        assert_eq!(escape("one\ntwo"), r"one\Ntwo");
        assert_eq!(escape("plain"), "plain");
    }

    #[test]
    fn test_word_only_text() {
        assert_eq!(word_only_text("Hello,"), "HELLO");
        assert_eq!(word_only_text("end...\u{201D}"), "END");
        assert_eq!(word_only_text("(aside)"), "(ASIDE");
        assert_eq!(word_only_text("wait\u{2014}"), "WAIT");
        assert_eq!(word_only_text("don't"), "DON'T");
        assert_eq!(word_only_text("?!"), "");
    }

    #[test]
    fn test_word_only_event() {
        let segs = vec![segment(vec![WordToken::new("Hello,", 1.0, 1.4)])];
        let style = SubtitleStyle::default();
        let events = build_events(&segs, &style, SubtitleMode::WordOnly);
        assert_eq!(events.len(), 1);
        assert_eq!(fmt_time(events[0].start), "0:00:01.00");
        assert_eq!(fmt_time(events[0].end), "0:00:01.40");
        assert_eq!(
            events[0].text,
            r"{\b1\fs72\c&HFFFFFF&\3c&H000000&\bord4\shad0}HELLO"
        );
        assert_eq!(
            events[0].to_string(),
            r"Dialogue:0,0:00:01.00,0:00:01.40,Base,,60,60,40,,{\b1\fs72\c&HFFFFFF&\3c&H000000&\bord4\shad0}HELLO"
        );
    }

    #[test]
    fn test_word_only_drops_empty_and_unanchored() {
        let segs = vec![segment(vec![
            WordToken::new("One", 0.0, 0.3),
            WordToken::new("\u{2014}", 0.3, 0.4),
            WordToken {
                word: "two".into(),
                start: Some(0.5),
                end: None,
            },
            WordToken::new("{three}", 0.6, 0.9),
        ])];
        let events = build_events(&segs, &SubtitleStyle::default(), SubtitleMode::WordOnly);
        let texts: Vec<_> = events.iter().map(|e| e.text.rsplit('}').next().unwrap()).collect();
        assert_eq!(events.len(), 2);
        assert!(events[0].text.ends_with("ONE"));
        assert!(events[1].text.ends_with(r"\{THREE"));
        assert_eq!(texts[0], "ONE");
    }

    #[test]
    fn test_segment_overlay_events() {
        let segs = vec![AlignedSegment {
            start: 0.0,
            end: 3.0,
            text: "The {old} fox".into(),
            words: vec![
                WordToken::new("The", 0.2, 0.5),
                WordToken::new(" {old} ", 0.6, 1.0),
                WordToken {
                    word: "quietly".into(),
                    start: None,
                    end: None,
                },
                WordToken::new("fox", 1.1, 1.6),
            ],
        }];
        let events = build_events(&segs, &SubtitleStyle::default(), SubtitleMode::SegmentOverlay);
        assert_eq!(events.len(), 4);

        assert_eq!(events[0].layer, 0);
        assert_eq!(events[0].style, "Base");
        assert_eq!((events[0].start, events[0].end), (0.0, 3.0));
        assert_eq!(events[0].text, r"{\q2}The \{old\} fox");

        assert_eq!(events[1].layer, 1);
        assert_eq!(events[1].style, "HL");
        assert_eq!(events[1].text, r"{\q2}The");
        assert_eq!(events[2].text, r"{\q2}    \{old\}");
        assert_eq!((events[2].start, events[2].end), (0.6, 1.0));
        assert_eq!(events[3].text, r"{\q2}          fox");
    }

    #[test]
    fn test_segment_without_timed_words_is_skipped() {
        let segs = vec![
            AlignedSegment {
                start: 0.0,
                end: 1.0,
                text: "42".into(),
                words: vec![WordToken {
                    word: "42".into(),
                    start: None,
                    end: None,
                }],
            },
            segment(vec![WordToken::new("Next", 1.0, 1.5)]),
        ];
        let events = build_events(&segs, &SubtitleStyle::default(), SubtitleMode::SegmentOverlay);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].text, r"{\q2}Next");
    }

    #[test]
    fn test_events_keep_alignment_order() {
        let segs = vec![
            segment(vec![WordToken::new("late", 5.0, 5.5)]),
            segment(vec![WordToken::new("early", 1.0, 1.5)]),
        ];
        let events = build_events(&segs, &SubtitleStyle::default(), SubtitleMode::WordOnly);
        assert!(events[0].text.ends_with("LATE"));
        assert!(events[1].text.ends_with("EARLY"));
    }

    #[test]
    fn test_header_styles_per_mode() {
        let style = SubtitleStyle::default();
        let overlay = ass_header(&style, SubtitleMode::SegmentOverlay);
        assert!(overlay.starts_with("[Script Info]\nScriptType: v4.00+\nPlayResX:1080\nPlayResY:1920\n\n"));
        assert!(overlay.contains(
            "Style: Base,DejaVu Sans Mono,54,&H00FFFFFF,&H000000FF,&H00111111,&H64000000,0,0,0,0,100,100,0,0,1,3,0,5,60,60,40,1\n"
        ));
        assert!(overlay.contains(
            "Style: HL,DejaVu Sans Mono,54,&H00000000,&H000000FF,&H00000000,&H8033CCFF,0,0,0,0,100,100,0,0,3,0,0,5,60,60,40,1\n"
        ));
        assert!(overlay.ends_with(
            "[Events]\nFormat: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text\n"
        ));

        let words = ass_header(&style, SubtitleMode::WordOnly);
        assert!(words.contains("Style: Base,DejaVu Sans Mono,72,"));
        assert!(!words.contains("Style: HL"));
    }

    #[test]
    fn test_write_ass() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("subtitles").join("output.ass");
        let segs = vec![segment(vec![WordToken::new("Hi\\there", 0.0, 0.5)])];
        let style = SubtitleStyle::default();
        let events = build_events(&segs, &style, SubtitleMode::SegmentOverlay);
        write_ass(&path, &style, SubtitleMode::SegmentOverlay, &events).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, render_ass(&style, SubtitleMode::SegmentOverlay, &events));
        assert!(written.ends_with("Dialogue:1,0:00:00.00,0:00:00.50,HL,,60,60,40,,{\\q2}Hi\\\\there\n"));
        assert_eq!(std::fs::read_dir(path.parent().unwrap()).unwrap().count(), 1);
    }
}
