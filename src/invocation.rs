//! Command descriptions for the program under test
//!
//! An [`Invocation`] is an immutable value describing one run of the binary:
//! input, output, mode, and any mode-specific option groups. It renders
//! itself into an argument vector with a fixed token order:
//!
//! ```text
//! -f <input> -o <output> -m <mode> [-s] [-t <timing>] <option groups...>
//! ```

use crate::error::{HarnessError, Result};
use serde::{Deserialize, Serialize};

/// One structured command for the program under test
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    input: String,
    output: String,
    mode: String,
    simple_mode: bool,
    timing_file: Option<String>,
    options: Vec<OptionGroup>,
}

impl Invocation {
    /// Create an invocation with the three required fields
    pub fn new(input: impl Into<String>, output: impl Into<String>, mode: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            mode: mode.into(),
            simple_mode: false,
            timing_file: None,
            options: Vec::new(),
        }
    }

    pub fn builder() -> InvocationBuilder {
        InvocationBuilder::default()
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    /// Output file, relative to the working directory of the run
    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn mode(&self) -> &str {
        &self.mode
    }

    pub fn timing_file(&self) -> Option<&str> {
        self.timing_file.as_deref()
    }

    pub fn options(&self) -> &[OptionGroup] {
        &self.options
    }

    pub fn with_simple_mode(mut self, simple_mode: bool) -> Self {
        self.simple_mode = simple_mode;
        self
    }

    /// Copy of this invocation writing its phase timings to `timing_file`
    pub fn with_timing_file(&self, timing_file: impl Into<String>) -> Self {
        Self {
            timing_file: Some(timing_file.into()),
            ..self.clone()
        }
    }

    /// Attach an option group; groups serialize in attachment order
    pub fn with_option(mut self, group: OptionGroup) -> Self {
        self.options.push(group);
        self
    }

    /// Render the argument vector
    ///
    /// Fails with [`HarnessError::MissingField`] if a required field is empty
    /// or an option group is incomplete.
    pub fn to_args(&self) -> Result<Vec<String>> {
        require(&self.input, "infile")?;
        require(&self.output, "outfile")?;
        require(&self.mode, "mode")?;

        let mut args = vec![
            "-f".to_string(),
            self.input.clone(),
            "-o".to_string(),
            self.output.clone(),
            "-m".to_string(),
            self.mode.clone(),
        ];

        if self.simple_mode {
            args.push("-s".to_string());
        }

        if let Some(timing) = &self.timing_file {
            args.push("-t".to_string());
            args.push(timing.clone());
        }

        for group in &self.options {
            args.extend(group.to_args()?);
        }

        Ok(args)
    }
}

fn require(value: &str, name: &str) -> Result<()> {
    if value.is_empty() {
        return Err(HarnessError::MissingField(format!("{} must be defined", name)));
    }
    Ok(())
}

/// Builder that reports absent required fields at construction time
#[derive(Debug, Default)]
pub struct InvocationBuilder {
    input: Option<String>,
    output: Option<String>,
    mode: Option<String>,
    simple_mode: bool,
    timing_file: Option<String>,
    options: Vec<OptionGroup>,
}

impl InvocationBuilder {
    pub fn input(mut self, input: impl Into<String>) -> Self {
        self.input = Some(input.into());
        self
    }

    pub fn output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }

    pub fn mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = Some(mode.into());
        self
    }

    pub fn simple_mode(mut self, simple_mode: bool) -> Self {
        self.simple_mode = simple_mode;
        self
    }

    pub fn timing_file(mut self, timing_file: impl Into<String>) -> Self {
        self.timing_file = Some(timing_file.into());
        self
    }

    pub fn option(mut self, group: OptionGroup) -> Self {
        self.options.push(group);
        self
    }

    /// Checks infile, outfile and mode, in that order
    pub fn build(self) -> Result<Invocation> {
        let missing = |name: &str| HarnessError::MissingField(format!("{} must be defined", name));
        let input = self.input.ok_or_else(|| missing("infile"))?;
        let output = self.output.ok_or_else(|| missing("outfile"))?;
        let mode = self.mode.ok_or_else(|| missing("mode"))?;

        Ok(Invocation {
            input,
            output,
            mode,
            simple_mode: self.simple_mode,
            timing_file: self.timing_file,
            options: self.options,
        })
    }
}

/// Mode-specific option groups
///
/// Each variant validates its own fields when rendered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OptionGroup {
    Visibility(VisibilityOptions),
    Link(LinkOptions),
    /// Free-form flags, rendered in insertion order
    Extra(Vec<(String, ArgValue)>),
}

impl OptionGroup {
    pub fn to_args(&self) -> Result<Vec<String>> {
        match self {
            OptionGroup::Visibility(options) => options.to_args(),
            OptionGroup::Link(options) => options.to_args(),
            OptionGroup::Extra(entries) => Ok(extra_args(entries)),
        }
    }
}

/// Value attached to a free-form flag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgValue {
    /// Repeated flag: `key v1 key v2 ...`
    Repeated(Vec<String>),
    /// `key value`, or just `key` when the value is empty
    Single(String),
}

fn extra_args(entries: &[(String, ArgValue)]) -> Vec<String> {
    let mut args = Vec::new();
    for (key, value) in entries {
        match value {
            ArgValue::Repeated(values) => {
                for v in values {
                    args.push(key.clone());
                    args.push(v.clone());
                }
            }
            ArgValue::Single(v) => {
                args.push(key.clone());
                if !v.is_empty() {
                    args.push(v.clone());
                }
            }
        }
    }
    args
}

/// Visibility graph analysis mode (`-vm`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisibilityMode {
    Isovist,
    Visibility,
    Metric,
    Angular,
}

impl VisibilityMode {
    pub fn as_str(self) -> &'static str {
        match self {
            VisibilityMode::Isovist => "isovist",
            VisibilityMode::Visibility => "visibility",
            VisibilityMode::Metric => "metric",
            VisibilityMode::Angular => "angular",
        }
    }
}

/// Visibility analysis option group
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisibilityOptions {
    pub mode: Option<VisibilityMode>,
    /// Global measures (`-vg`)
    pub global: bool,
    /// Local measures (`-vl`)
    pub local: bool,
    /// Radius (`-vr`): a positive integer or `n`
    pub radius: Option<String>,
}

impl VisibilityOptions {
    pub fn to_args(&self) -> Result<Vec<String>> {
        let mode = self.mode.ok_or_else(|| {
            HarnessError::MissingField("visibility mode must be defined".to_string())
        })?;

        let has_radius = self.radius.as_deref().is_some_and(|r| !r.is_empty());
        if mode == VisibilityMode::Visibility && self.global && !has_radius {
            return Err(HarnessError::MissingField(
                "visibility radius must be defined for global measures".to_string(),
            ));
        }
        if mode == VisibilityMode::Metric && !has_radius {
            return Err(HarnessError::MissingField(
                "visibility radius must be defined for metric analysis".to_string(),
            ));
        }

        let mut args = vec!["-vm".to_string(), mode.as_str().to_string()];
        if self.global {
            args.push("-vg".to_string());
        }
        if self.local {
            args.push("-vl".to_string());
        }
        if let Some(radius) = self.radius.as_ref().filter(|r| !r.is_empty()) {
            args.push("-vr".to_string());
            args.push(radius.clone());
        }
        Ok(args)
    }
}

/// Map family to link (`-lmt`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkMapType {
    Pointmaps,
    Shapegraphs,
}

/// Link or unlink (`-lm`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkMode {
    Link,
    Unlink,
}

/// How links are addressed (`-lt`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkType {
    Coords,
    Refs,
}

/// Link specification option group
///
/// Exactly one of `links_file` and `manual_links` must be given.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LinkOptions {
    /// `-lf <file>`
    #[serde(alias = "file")]
    pub links_file: Option<String>,
    /// `-lnk <link>` per entry
    #[serde(alias = "links")]
    pub manual_links: Vec<String>,
    pub map_type: Option<LinkMapType>,
    pub link_mode: Option<LinkMode>,
    pub link_type: Option<LinkType>,
}

impl LinkOptions {
    pub fn to_args(&self) -> Result<Vec<String>> {
        let links_file = self.links_file.as_ref().filter(|f| !f.is_empty());
        match (links_file, self.manual_links.is_empty()) {
            (None, true) => {
                return Err(HarnessError::MissingField(
                    "one of links file or manual links must be defined".to_string(),
                ))
            }
            (Some(_), false) => {
                return Err(HarnessError::MissingField(
                    "links file and manual links are mutually exclusive".to_string(),
                ))
            }
            _ => {}
        }

        let mut args = Vec::new();
        if let Some(map_type) = self.map_type {
            args.push("-lmt".to_string());
            args.push(
                match map_type {
                    LinkMapType::Pointmaps => "pointmaps",
                    LinkMapType::Shapegraphs => "shapegraphs",
                }
                .to_string(),
            );
        }
        if let Some(link_mode) = self.link_mode {
            args.push("-lm".to_string());
            args.push(
                match link_mode {
                    LinkMode::Link => "link",
                    LinkMode::Unlink => "unlink",
                }
                .to_string(),
            );
        }
        if let Some(link_type) = self.link_type {
            args.push("-lt".to_string());
            args.push(
                match link_type {
                    LinkType::Coords => "coords",
                    LinkType::Refs => "refs",
                }
                .to_string(),
            );
        }

        if let Some(file) = links_file {
            args.push("-lf".to_string());
            args.push(file.clone());
        }
        for link in &self.manual_links {
            args.push("-lnk".to_string());
            args.push(link.clone());
        }
        Ok(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_required_fields_only() {
        let cmd = Invocation::new("foo", "bar", "visibility");
        assert_eq!(
            cmd.to_args().unwrap(),
            args(&["-f", "foo", "-o", "bar", "-m", "visibility"])
        );
    }

    #[test]
    fn test_simple_mode_and_timing_order() {
        let cmd = Invocation::new("foo", "bar", "VGA")
            .with_simple_mode(true)
            .with_timing_file("timings_0_0.csv");
        assert_eq!(
            cmd.to_args().unwrap(),
            args(&["-f", "foo", "-o", "bar", "-m", "VGA", "-s", "-t", "timings_0_0.csv"])
        );
    }

    #[test]
    fn test_builder_reports_missing_fields_in_order() {
        let err = Invocation::builder().build().unwrap_err();
        assert_eq!(err.to_string(), "infile must be defined");

        let err = Invocation::builder().input("foo").build().unwrap_err();
        assert_eq!(err.to_string(), "outfile must be defined");

        let err = Invocation::builder()
            .input("foo")
            .output("bar")
            .build()
            .unwrap_err();
        assert_eq!(err.to_string(), "mode must be defined");

        let cmd = Invocation::builder()
            .input("foo")
            .output("bar")
            .mode("VGA")
            .build()
            .unwrap();
        assert_eq!(cmd, Invocation::new("foo", "bar", "VGA"));
    }

    #[test]
    fn test_empty_required_field_fails_serialization() {
        let cmd = Invocation::new("foo", "", "VGA");
        assert!(matches!(cmd.to_args(), Err(HarnessError::MissingField(_))));
    }

    #[test]
    fn test_with_timing_file_does_not_alias() {
        let original = Invocation::new("foo", "bar", "VGA").with_option(OptionGroup::Extra(vec![(
            "-vr".to_string(),
            ArgValue::Single("5".to_string()),
        )]));
        let timed = original.with_timing_file("t.csv");
        assert_eq!(original.timing_file(), None);
        assert_eq!(timed.timing_file(), Some("t.csv"));
        assert_eq!(original.options(), timed.options());
    }

    #[test]
    fn test_extra_args_rendering() {
        let cmd = Invocation::new("foo", "bar", "visibility").with_option(OptionGroup::Extra(vec![
            (
                "-lnk".to_string(),
                ArgValue::Repeated(vec!["foo".to_string(), "bar".to_string()]),
            ),
            ("-vm".to_string(), ArgValue::Single("metric".to_string())),
            ("-vg".to_string(), ArgValue::Single(String::new())),
        ]));
        assert_eq!(
            cmd.to_args().unwrap(),
            args(&[
                "-f", "foo", "-o", "bar", "-m", "visibility", "-lnk", "foo", "-lnk", "bar", "-vm",
                "metric", "-vg"
            ])
        );
    }

    #[test]
    fn test_visibility_group() {
        let group = VisibilityOptions {
            mode: Some(VisibilityMode::Visibility),
            global: true,
            local: true,
            radius: Some("n".to_string()),
        };
        assert_eq!(
            group.to_args().unwrap(),
            args(&["-vm", "visibility", "-vg", "-vl", "-vr", "n"])
        );
    }

    #[test]
    fn test_visibility_group_missing_fields() {
        let err = VisibilityOptions::default().to_args().unwrap_err();
        assert_eq!(err.to_string(), "visibility mode must be defined");

        let global_without_radius = VisibilityOptions {
            mode: Some(VisibilityMode::Visibility),
            global: true,
            ..Default::default()
        };
        assert!(matches!(
            global_without_radius.to_args(),
            Err(HarnessError::MissingField(_))
        ));

        let metric_without_radius = VisibilityOptions {
            mode: Some(VisibilityMode::Metric),
            ..Default::default()
        };
        assert!(matches!(
            metric_without_radius.to_args(),
            Err(HarnessError::MissingField(_))
        ));
    }

    #[test]
    fn test_link_group_requires_exactly_one_source() {
        let err = LinkOptions::default().to_args().unwrap_err();
        assert_eq!(
            err.to_string(),
            "one of links file or manual links must be defined"
        );

        let both = LinkOptions {
            links_file: Some("links.tsv".to_string()),
            manual_links: vec!["1.0,2.0,3.0,4.0".to_string()],
            ..Default::default()
        };
        assert_eq!(
            both.to_args().unwrap_err().to_string(),
            "links file and manual links are mutually exclusive"
        );
    }

    #[test]
    fn test_link_group_rendering() {
        let group = LinkOptions {
            manual_links: vec!["1,2,3,4".to_string(), "5,6,7,8".to_string()],
            map_type: Some(LinkMapType::Shapegraphs),
            link_mode: Some(LinkMode::Unlink),
            link_type: Some(LinkType::Coords),
            ..Default::default()
        };
        assert_eq!(
            group.to_args().unwrap(),
            args(&[
                "-lmt", "shapegraphs", "-lm", "unlink", "-lt", "coords", "-lnk", "1,2,3,4", "-lnk",
                "5,6,7,8"
            ])
        );
    }

    #[test]
    fn test_option_groups_keep_attachment_order() {
        let cmd = Invocation::new("in.graph", "out.graph", "LINK")
            .with_option(OptionGroup::Link(LinkOptions {
                links_file: Some("links.tsv".to_string()),
                ..Default::default()
            }))
            .with_option(OptionGroup::Visibility(VisibilityOptions {
                mode: Some(VisibilityMode::Isovist),
                ..Default::default()
            }));
        assert_eq!(
            cmd.to_args().unwrap(),
            args(&[
                "-f", "in.graph", "-o", "out.graph", "-m", "LINK", "-lf", "links.tsv", "-vm",
                "isovist"
            ])
        );
    }

    #[test]
    fn test_invalid_group_fails_whole_invocation() {
        let cmd = Invocation::new("foo", "bar", "LINK").with_option(OptionGroup::Link(LinkOptions::default()));
        assert!(matches!(cmd.to_args(), Err(HarnessError::MissingField(_))));
    }
}
