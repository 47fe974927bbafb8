//! Bounding box labels in the YOLO text format.
//!
//! A label file holds one box per line as five whitespace-separated fields:
//! `class_id x_center y_center width height`. Geometry is in ratio units
//! relative to the image size.

use noisy_float::prelude::*;
use serde::{Deserialize, Serialize};
use std::{fmt, ops::Deref, str::FromStr};
use thiserror::Error;

/// The number of fields on a label line.
pub const NUM_FIELDS: usize = 5;

/// The reason a label line was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LabelErrorKind {
    #[error("expect {} fields, but found {found}", NUM_FIELDS)]
    FieldCount { found: usize },
    #[error("'{token}' is not a finite number")]
    InvalidNumber { token: String },
    #[error("'{token}' is not a valid class id")]
    InvalidClass { token: String },
    #[error("the line is not valid UTF-8")]
    InvalidUtf8,
}

/// A malformed line in a label file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid label at line {line}: {kind}")]
pub struct LabelError {
    /// 1-based line number.
    pub line: usize,
    #[source]
    pub kind: LabelErrorKind,
}

/// A labeled bounding box in ratio units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Label {
    pub class_id: usize,
    pub x_center: R64,
    pub y_center: R64,
    pub width: R64,
    pub height: R64,
}

impl Label {
    /// The box in `[top, left, bottom, right]` ratio units.
    pub fn tlbr(&self) -> [R64; 4] {
        let half_h = self.height / 2.0;
        let half_w = self.width / 2.0;
        [
            self.y_center - half_h,
            self.x_center - half_w,
            self.y_center + half_h,
            self.x_center + half_w,
        ]
    }

    /// The box in `[top, left, bottom, right]` pixel units of an image with the given size.
    pub fn to_pixel_tlbr(&self, image_h: usize, image_w: usize) -> [f64; 4] {
        let [t, l, b, r] = self.tlbr();
        let image_h = image_h as f64;
        let image_w = image_w as f64;
        [
            t.raw() * image_h,
            l.raw() * image_w,
            b.raw() * image_h,
            r.raw() * image_w,
        ]
    }

    /// The values in file order, `[class_id, x_center, y_center, width, height]`.
    pub fn to_array(&self) -> [f64; NUM_FIELDS] {
        [
            self.class_id as f64,
            self.x_center.raw(),
            self.y_center.raw(),
            self.width.raw(),
            self.height.raw(),
        ]
    }
}

impl FromStr for Label {
    type Err = LabelErrorKind;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let [class, cx, cy, w, h]: [&str; NUM_FIELDS] = tokens
            .as_slice()
            .try_into()
            .map_err(|_| LabelErrorKind::FieldCount {
                found: tokens.len(),
            })?;

        Ok(Self {
            class_id: parse_class_id(class)?,
            x_center: parse_real(cx)?,
            y_center: parse_real(cy)?,
            width: parse_real(w)?,
            height: parse_real(h)?,
        })
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {}",
            self.class_id, self.x_center, self.y_center, self.width, self.height
        )
    }
}

/// The labels of one image, in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LabelSet(Vec<Label>);

impl LabelSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses the content of a label file.
    ///
    /// Blank lines are ignored. The first malformed line fails the whole file.
    pub fn parse_str(text: &str) -> Result<Self, LabelError> {
        let labels = text
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(index, line)| {
                line.parse::<Label>().map_err(|kind| LabelError {
                    line: index + 1,
                    kind,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self(labels))
    }

    /// Parses raw file content. Invalid UTF-8 fails at the line holding the bad bytes.
    pub fn parse_bytes(bytes: &[u8]) -> Result<Self, LabelError> {
        let text = std::str::from_utf8(bytes).map_err(|err| {
            let valid = &bytes[..err.valid_up_to()];
            LabelError {
                line: valid.iter().filter(|&&byte| byte == b'\n').count() + 1,
                kind: LabelErrorKind::InvalidUtf8,
            }
        })?;
        Self::parse_str(text)
    }

    pub fn into_inner(self) -> Vec<Label> {
        self.0
    }
}

impl Deref for LabelSet {
    type Target = [Label];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Vec<Label>> for LabelSet {
    fn from(labels: Vec<Label>) -> Self {
        Self(labels)
    }
}

impl FromIterator<Label> for LabelSet {
    fn from_iter<I: IntoIterator<Item = Label>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for LabelSet {
    type Item = Label;
    type IntoIter = std::vec::IntoIter<Label>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a LabelSet {
    type Item = &'a Label;
    type IntoIter = std::slice::Iter<'a, Label>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

fn parse_real(token: &str) -> Result<R64, LabelErrorKind> {
    token
        .parse::<f64>()
        .ok()
        .and_then(R64::try_new)
        .ok_or_else(|| LabelErrorKind::InvalidNumber {
            token: token.to_owned(),
        })
}

// exporters commonly write class ids as "3.0"
fn parse_class_id(token: &str) -> Result<usize, LabelErrorKind> {
    if let Ok(id) = token.parse::<usize>() {
        return Ok(id);
    }

    let value = parse_real(token)?.raw();
    if value < 0.0 || value.fract() != 0.0 || value > usize::MAX as f64 {
        return Err(LabelErrorKind::InvalidClass {
            token: token.to_owned(),
        });
    }
    Ok(value as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn parse_well_formed_file() {
        let text = "0 0.5 0.5 0.2 0.4\n\n3 0.1 0.2 0.3 0.4\n   \n";
        let labels = LabelSet::parse_str(text).unwrap();
        assert_eq!(labels.len(), 2);

        let first = labels[0];
        assert_eq!(first.class_id, 0);
        assert_eq!(first.x_center, r64(0.5));
        assert_eq!(first.y_center, r64(0.5));
        assert_eq!(first.width, r64(0.2));
        assert_eq!(first.height, r64(0.4));

        assert_eq!(labels[1].to_array(), [3.0, 0.1, 0.2, 0.3, 0.4]);
    }

    #[test]
    fn parse_empty_file() {
        assert!(LabelSet::parse_str("").unwrap().is_empty());
        assert!(LabelSet::parse_str("\n\n").unwrap().is_empty());
    }

    #[test]
    fn missing_fields_fail_the_file() {
        let err = LabelSet::parse_str("0 0.5 0.5 0.2 0.4\n1 0.5 0.5\n").unwrap_err();
        assert_eq!(err.line, 2);
        assert_eq!(err.kind, LabelErrorKind::FieldCount { found: 3 });
    }

    #[test]
    fn invalid_utf8_names_the_line() {
        let bytes = b"0 0.5 0.5 0.2 0.4\n1 0.5 \xff 0.2 0.4\n";
        let err = LabelSet::parse_bytes(bytes).unwrap_err();
        assert_eq!(err.line, 2);
        assert_eq!(err.kind, LabelErrorKind::InvalidUtf8);

        let labels = LabelSet::parse_bytes(b"0 0.5 0.5 0.2 0.4\n").unwrap();
        assert_eq!(labels.len(), 1);
    }

    #[test]
    fn extra_fields_are_rejected() {
        let err = "0 0.5 0.5 0.2 0.4 0.9".parse::<Label>().unwrap_err();
        assert_eq!(err, LabelErrorKind::FieldCount { found: 6 });
    }

    #[test]
    fn non_numeric_token_is_rejected() {
        let err = "0 0.5 abc 0.2 0.4".parse::<Label>().unwrap_err();
        assert_eq!(
            err,
            LabelErrorKind::InvalidNumber {
                token: "abc".into()
            }
        );

        let err = "0 0.5 nan 0.2 0.4".parse::<Label>().unwrap_err();
        assert!(matches!(err, LabelErrorKind::InvalidNumber { .. }));
    }

    #[test]
    fn class_id_accepts_integral_floats() {
        let label: Label = "2.0 0.5 0.5 0.2 0.4".parse().unwrap();
        assert_eq!(label.class_id, 2);

        let err = "2.5 0.5 0.5 0.2 0.4".parse::<Label>().unwrap_err();
        assert!(matches!(err, LabelErrorKind::InvalidClass { .. }));

        let err = "-1 0.5 0.5 0.2 0.4".parse::<Label>().unwrap_err();
        assert!(matches!(err, LabelErrorKind::InvalidClass { .. }));
    }

    #[test]
    fn pixel_tlbr() {
        let label: Label = "0 0.5 0.25 0.2 0.5".parse().unwrap();
        let [t, l, b, r] = label.to_pixel_tlbr(100, 200);
        assert_abs_diff_eq!(t, 0.0);
        assert_abs_diff_eq!(l, 80.0);
        assert_abs_diff_eq!(b, 50.0);
        assert_abs_diff_eq!(r, 120.0);
    }
}
