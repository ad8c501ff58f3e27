use crate::hardware::{DisplayConfiguration, HardwareError, OutputConfiguration};
use crate::screen::{FormFactor, Mode, OutputId, Point, PowerMode, Resolution};
use regex::{Captures, Regex};
use std::str::FromStr;

struct Parser {
    output_line_regex: Regex,
    mode_line_regex: Regex,
    width_line_regex: Regex,
    height_line_regex: Regex,
    transform_line_regex: Regex,
    edid_start_regex: Regex,
    edid_data_regex: Regex,
}

/// Mode whose `h:`/`v:` detail lines have not been read yet.
struct PendingMode {
    current: bool,
    width: Option<u32>,
}

struct ParsedOutput {
    configuration: OutputConfiguration,
    current_mode_index: Option<usize>,
    pending_mode: Option<PendingMode>,
    reading_edid: bool,
    edid_hex: String,
}

fn number<T: FromStr>(caps: &Captures, name: &str) -> Result<T, HardwareError> {
    caps[name].parse().map_err(|_| HardwareError::Parse {
        what: "xrandr output",
        reason: format!("{name} {:?} is out of range", &caps[name]),
    })
}

fn decode_hex(hex: &str) -> Result<Vec<u8>, HardwareError> {
    (0..hex.len())
        .step_by(2)
        .map(|i| {
            hex.get(i..i + 2)
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(|| HardwareError::Parse {
                    what: "xrandr EDID",
                    reason: format!("bad hex at offset {i}"),
                })
        })
        .collect()
}

impl ParsedOutput {
    fn finish(mut self) -> Result<OutputConfiguration, HardwareError> {
        self.configuration.current_mode_index = self.current_mode_index.unwrap_or(0);
        if !self.edid_hex.is_empty() {
            self.configuration.edid = Some(decode_hex(&self.edid_hex)?);
        }
        Ok(self.configuration)
    }
}

impl Parser {
    fn new() -> Self {
        Self {
            output_line_regex: Regex::new(
                r"(?x)
                ^(?P<name>\S+)
                \s(?P<status>connected|disconnected)
                (?:\sprimary)?
                (?:\s(?P<width>\d+)x(?P<height>\d+)\+(?P<x>-?\d+)\+(?P<y>-?\d+))?
                \s
                (?:.*\s(?P<mm_width>\d+)mm\sx\s(?P<mm_height>\d+)mm)?
            ",
            )
            .expect("bad output_line_regex"),
            mode_line_regex: Regex::new(r"^\s+\S+\s+\(0x[0-9a-f]+\)\s+\d+\.\d+MHz(?P<flags>.*)$")
                .expect("bad mode_line_regex"),
            width_line_regex: Regex::new(r"^\s+h:\s+width\s+(?P<width>\d+)\s")
                .expect("bad width_line_regex"),
            height_line_regex: Regex::new(
                r"^\s+v:\s+height\s+(?P<height>\d+)\s.*clock\s+(?P<hz>\d+)\.(?P<centihz>\d{2})Hz",
            )
            .expect("bad height_line_regex"),
            transform_line_regex: Regex::new(r"^\s+Transform:\s+(?P<factor>\d+\.\d+)\s")
                .expect("bad transform_line_regex"),
            edid_start_regex: Regex::new(r"^\s+EDID:\s*$").expect("bad edid_start_regex"),
            edid_data_regex: Regex::new(r"^\s+(?P<hex>[0-9a-f]{32})\s*$")
                .expect("bad edid_data_regex"),
        }
    }

    fn parse_output_line(&self, line: &str) -> Result<Option<ParsedOutput>, HardwareError> {
        let Some(caps) = self.output_line_regex.captures(line) else {
            return Ok(None);
        };

        let top_left = match (caps.name("x"), caps.name("y")) {
            (Some(_), Some(_)) => Point {
                x: number(&caps, "x")?,
                y: number(&caps, "y")?,
            },
            _ => Point::default(),
        };
        let physical_size_mm = match (caps.name("mm_width"), caps.name("mm_height")) {
            (Some(_), Some(_)) => (number(&caps, "mm_width")?, number(&caps, "mm_height")?),
            _ => (0, 0),
        };

        Ok(Some(ParsedOutput {
            configuration: OutputConfiguration {
                id: OutputId::new(&caps["name"]),
                connected: &caps["status"] == "connected",
                used: caps.name("width").is_some(),
                top_left,
                current_mode_index: 0,
                modes: Vec::new(),
                power_mode: PowerMode::On,
                scale: 1.0,
                form_factor: FormFactor::Monitor,
                physical_size_mm,
                edid: None,
            },
            current_mode_index: None,
            pending_mode: None,
            reading_edid: false,
            edid_hex: String::new(),
        }))
    }

    fn parse_detail_line(&self, line: &str, output: &mut ParsedOutput) -> Result<(), HardwareError> {
        if output.reading_edid {
            if let Some(caps) = self.edid_data_regex.captures(line) {
                output.edid_hex.push_str(&caps["hex"]);
                return Ok(());
            }
            output.reading_edid = false;
        }

        if self.edid_start_regex.is_match(line) {
            output.reading_edid = true;
        } else if let Some(caps) = self.transform_line_regex.captures(line) {
            let factor: f64 = number(&caps, "factor")?;
            if factor > 0.0 {
                output.configuration.scale = 1.0 / factor;
            }
        } else if let Some(caps) = self.mode_line_regex.captures(line) {
            output.pending_mode = Some(PendingMode {
                current: caps["flags"].contains("*current"),
                width: None,
            });
        } else if let Some(caps) = self.width_line_regex.captures(line) {
            if let Some(pending) = output.pending_mode.as_mut() {
                pending.width = Some(number(&caps, "width")?);
            }
        } else if let Some(caps) = self.height_line_regex.captures(line) {
            if let Some(PendingMode {
                current,
                width: Some(width),
            }) = output.pending_mode.take()
            {
                let hz: u32 = number(&caps, "hz")?;
                let centihz: u32 = number(&caps, "centihz")?;
                let modes = &mut output.configuration.modes;
                if current {
                    output.current_mode_index = Some(modes.len());
                }
                modes.push(Mode {
                    resolution: Resolution {
                        width,
                        height: number(&caps, "height")?,
                    },
                    refresh_rate_millihz: hz * 1000 + centihz * 10,
                });
            }
        }

        Ok(())
    }

    fn parse(&self, xrandr_output: &str) -> Result<DisplayConfiguration, HardwareError> {
        let mut outputs = Vec::new();
        let mut current_output: Option<ParsedOutput> = None;

        for line in xrandr_output.lines() {
            if let Some(output) = self.parse_output_line(line)? {
                if let Some(output) = current_output {
                    outputs.push(output.finish()?);
                }
                current_output = Some(output);
            } else if let Some(output) = current_output.as_mut() {
                self.parse_detail_line(line, output)?;
            }
        }

        if let Some(output) = current_output {
            outputs.push(output.finish()?);
        }

        Ok(DisplayConfiguration { outputs })
    }
}

/// Parses the output of `xrandr --verbose`.
pub(super) fn parse(xrandr_output: &str) -> Result<DisplayConfiguration, HardwareError> {
    Parser::new().parse(xrandr_output)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::edid::samples::{BOE_EDID, SAMSUNG_EDID};

    #[test]
    fn parse_output_line_must_return_nothing() {
        let parser = Parser::new();
        assert!(matches!(parser.parse_output_line(SCREEN_LINE), Ok(None)));
        for line in VERBOSE_INFO_LINES {
            assert!(matches!(parser.parse_output_line(line), Ok(None)));
        }
    }

    #[test]
    fn parse_output_line_must_return_something() {
        // Arrange
        struct TestCase {
            line: &'static str,
            name: &'static str,
            connected: bool,
            used: bool,
            top_left: Point,
            physical_size_mm: (u32, u32),
        }

        let test_cases = [
            TestCase {
                line: CONNECTED_ENABLED_INTERNAL_OUTPUT_LINE,
                name: "eDP-1",
                connected: true,
                used: true,
                top_left: Point { x: 0, y: 0 },
                physical_size_mm: (309, 174),
            },
            TestCase {
                line: CONNECTED_DISABLED_EXTERNAL_OUTPUT_LINE,
                name: "HDMI-2",
                connected: true,
                used: false,
                top_left: Point { x: 0, y: 0 },
                physical_size_mm: (0, 0),
            },
            TestCase {
                line: DISCONNECTED_ENABLED_EXTERNAL_OUTPUT_LINE,
                name: "HDMI-2",
                connected: false,
                used: true,
                top_left: Point { x: 1920, y: 0 },
                physical_size_mm: (0, 0),
            },
            TestCase {
                line: DISCONNECTED_DISABLED_EXTERNAL_OUTPUT_LINE,
                name: "DP-1",
                connected: false,
                used: false,
                top_left: Point { x: 0, y: 0 },
                physical_size_mm: (0, 0),
            },
        ];

        let parser = Parser::new();

        for test_case in test_cases {
            // Act
            let output = parser.parse_output_line(test_case.line);

            // Assert
            let Ok(Some(output)) = output else {
                panic!("expected some output");
            };
            let output = output.configuration;
            assert_eq!(output.id.as_str(), test_case.name);
            assert_eq!(output.connected, test_case.connected);
            assert_eq!(output.used, test_case.used);
            assert_eq!(output.top_left, test_case.top_left);
            assert_eq!(output.physical_size_mm, test_case.physical_size_mm);
        }
    }

    #[test]
    fn test_parse_verbose_output() {
        // Arrange
        let parser = Parser::new();

        // Act
        let configuration = parser.parse(TEST_OUTPUT).expect("parsable output");

        // Assert
        let outputs = &configuration.outputs;
        assert_eq!(outputs.len(), 3);

        assert_eq!(outputs[0].id.as_str(), "eDP-1");
        assert!(outputs[0].connected);
        assert!(outputs[0].used);
        assert_eq!(
            outputs[0].modes,
            [
                Mode {
                    resolution: Resolution {
                        width: 1920,
                        height: 1080
                    },
                    refresh_rate_millihz: 60050,
                },
                Mode {
                    resolution: Resolution {
                        width: 1680,
                        height: 1050
                    },
                    refresh_rate_millihz: 59950,
                },
                Mode {
                    resolution: Resolution {
                        width: 1280,
                        height: 720
                    },
                    refresh_rate_millihz: 59860,
                },
            ]
        );
        assert_eq!(outputs[0].current_mode_index, 0);
        assert_eq!(outputs[0].scale, 1.0);
        assert_eq!(outputs[0].physical_size_mm, (309, 174));
        assert_eq!(outputs[0].edid.as_deref(), Some(&BOE_EDID[..]));

        assert_eq!(outputs[1].id.as_str(), "HDMI-1");
        assert!(!outputs[1].connected);
        assert!(!outputs[1].used);
        assert!(outputs[1].modes.is_empty());
        assert_eq!(outputs[1].edid, None);

        assert_eq!(outputs[2].id.as_str(), "DP-1");
        assert!(outputs[2].connected);
        assert!(outputs[2].used);
        assert_eq!(outputs[2].top_left, Point { x: 1920, y: 0 });
        assert_eq!(outputs[2].modes.len(), 2);
        assert_eq!(outputs[2].current_mode_index, 1);
        assert_eq!(outputs[2].modes[1].refresh_rate_millihz, 60000);
        assert_eq!(outputs[2].scale, 2.0);
        assert_eq!(outputs[2].edid.as_deref(), Some(&SAMSUNG_EDID[..]));
    }

    const SCREEN_LINE: &str =
        "Screen 0: minimum 320 x 200, current 3840 x 1080, maximum 16384 x 16384";

    const CONNECTED_ENABLED_INTERNAL_OUTPUT_LINE: &str = "eDP-1 connected primary 1920x1080+0+0 (0x46) normal (normal left inverted right x axis y axis) 309mm x 174mm";
    const CONNECTED_DISABLED_EXTERNAL_OUTPUT_LINE: &str =
        "HDMI-2 connected (normal left inverted right x axis y axis)";
    const DISCONNECTED_ENABLED_EXTERNAL_OUTPUT_LINE: &str =
        "HDMI-2 disconnected 1920x1080+1920+0 (0x49) normal (normal left inverted right x axis y axis) 0mm x 0mm";
    const DISCONNECTED_DISABLED_EXTERNAL_OUTPUT_LINE: &str =
        "DP-1 disconnected (normal left inverted right x axis y axis)";

    const VERBOSE_INFO_LINES: [&str; 3] = [
        "  1920x1080 (0x501) 148.500MHz +HSync +VSync ",
        "        h: width  1920 start 2008 end 2052 total 2200 skew    0 clock  67.50KHz ",
        "        v: height 1080 start 1084 end 1089 total 1125           clock  60.00Hz ",
    ];

    const TEST_OUTPUT: &str = r#"
Screen 0: minimum 320 x 200, current 3840 x 1080, maximum 16384 x 16384
eDP-1 connected primary 1920x1080+0+0 (0x46) normal (normal left inverted right x axis y axis) 309mm x 174mm
	Identifier: 0x42 
	Timestamp:  1316
	Subpixel:   unknown
	Gamma:      1.0:1.0:1.0
	Brightness: 1.0
	Clones:    
	CRTC:       0
	CRTCs:      0 1 2
	Transform:  1.000000 0.000000 0.000000
	            0.000000 1.000000 0.000000
	            0.000000 0.000000 1.000000
	           filter: 
	EDID: 
		00ffffffffffff0009e5ac0600000000
		03190104951f1178029d409a5d558d28
		1e505400000001010101010101010101
		010101010101bc398018713828403020
		350035ad1000001a0000000000000000
		0000000000000000001a000000fe0042
		4f452044540a202020202020000000fe
		004e5631343046484d2d4e34350a00b7
	scaling mode: Full aspect 
		supported: Full, Center, Full aspect
	non-desktop: 0 
		range: (0, 1)
  1920x1080 (0x46) 141.000MHz -HSync -VSync *current +preferred
        h: width  1920 start 1936 end 1952 total 2104 skew    0 clock  67.02KHz
        v: height 1080 start 1083 end 1097 total 1116           clock  60.05Hz
  1680x1050 (0x47) 146.250MHz -HSync +VSync
        h: width  1680 start 1784 end 1960 total 2240 skew    0 clock  65.29KHz
        v: height 1050 start 1053 end 1059 total 1089           clock  59.95Hz
  1280x720 (0x48) 74.500MHz -HSync +VSync
        h: width  1280 start 1344 end 1472 total 1664 skew    0 clock  44.77KHz
        v: height  720 start  723 end  728 total  748           clock  59.86Hz
HDMI-1 disconnected (normal left inverted right x axis y axis)
	Identifier: 0x43 
	Timestamp:  1316
	Subpixel:   unknown
	Clones:    
	CRTCs:      0 1 2
	Transform:  1.000000 0.000000 0.000000
	            0.000000 1.000000 0.000000
	            0.000000 0.000000 1.000000
	           filter: 
DP-1 connected 3840x2160+1920+0 (0x4a) normal (normal left inverted right x axis y axis) 510mm x 290mm
	Identifier: 0x44 
	Timestamp:  1316
	Subpixel:   unknown
	Gamma:      1.0:1.0:1.0
	Brightness: 1.0
	Clones:    
	CRTC:       1
	CRTCs:      0 1 2
	Transform:  0.500000 0.000000 0.000000
	            0.000000 0.500000 0.000000
	            0.000000 0.000000 1.000000
	           filter: bilinear
	EDID: 
		00ffffffffffff004c2dd60831373130
		1216010380331d782a01f1a257529f27
		0a5054bfef80714f81c0810081809500
		a9c0b3000101023a801871382d40582c
		4500fe1f1100001e011d007251d01e20
		6e285500fe1f1100001e000000fd0032
		4b1e5111000a202020202020000000fc
		00533233423335300a20202020200111
		020311b14690041f13120365030c0010
		00011d00bc52d01e20b8285540fe1f11
		00001e8c0ad090204031200c405500fe
		1f110000188c0ad08a20e02d10103e96
		00fe1f11000018000000000000000000
		00000000000000000000000000000000
		00000000000000000000000000000000
		000000000000000000000000000000b4
  1920x1080 (0x49) 148.500MHz +HSync +VSync +preferred
        h: width  1920 start 2008 end 2052 total 2200 skew    0 clock  67.50KHz
        v: height 1080 start 1084 end 1089 total 1125           clock  50.00Hz
  1920x1080 (0x4a) 148.500MHz +HSync +VSync *current
        h: width  1920 start 2008 end 2052 total 2200 skew    0 clock  67.50KHz
        v: height 1080 start 1084 end 1089 total 1125           clock  60.00Hz
"#;
}
