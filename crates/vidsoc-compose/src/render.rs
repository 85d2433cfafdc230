//! Render constraint records to toolchain text.

use std::fmt::Write;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constraint::{Constraint, ConstraintSet};

/// Target constraint file syntax.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConstraintFormat {
    /// Xilinx ISE user constraints.
    #[default]
    Ucf,
    /// Xilinx Vivado design constraints.
    Xdc,
}

impl ConstraintFormat {
    /// Conventional file extension.
    pub fn extension(self) -> &'static str {
        match self {
            ConstraintFormat::Ucf => "ucf",
            ConstraintFormat::Xdc => "xdc",
        }
    }
}

impl FromStr for ConstraintFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ucf" => Ok(ConstraintFormat::Ucf),
            "xdc" => Ok(ConstraintFormat::Xdc),
            other => Err(format!("unknown constraint format '{other}' (expected ucf or xdc)")),
        }
    }
}

/// Render a constraint set, one directive per line.
pub fn render(set: &ConstraintSet, format: ConstraintFormat) -> String {
    let mut out = String::new();
    let mut sys_groups: Vec<&str> = Vec::new();
    for constraint in set.iter() {
        match format {
            ConstraintFormat::Ucf => render_ucf(&mut out, constraint, &mut sys_groups),
            ConstraintFormat::Xdc => render_xdc(&mut out, constraint),
        }
    }
    out
}

fn render_ucf<'a>(out: &mut String, constraint: &'a Constraint, sys_groups: &mut Vec<&'a str>) {
    // Writing to a String cannot fail.
    let _ = match constraint {
        Constraint::LocationLock { primitive, site } => {
            writeln!(out, "INST {primitive} LOC={site};")
        }
        Constraint::DisableDedicatedRoute { pin, .. } => {
            writeln!(out, "PIN \"{pin}\" CLOCK_DEDICATED_ROUTE = FALSE;")
        }
        Constraint::TimingGroup { net, group, .. } => {
            writeln!(out, "NET \"{net}\" TNM_NET = \"{group}\";")
        }
        Constraint::FalsePath {
            from_net,
            from_group,
            to_group,
            ..
        } => {
            if !sys_groups.contains(&from_group.as_str()) {
                sys_groups.push(from_group);
                let _ = writeln!(out, "NET \"{from_net}\" TNM_NET = \"{from_group}\";");
            }
            let from = from_group.trim_start_matches("GRP");
            let to = to_group.trim_start_matches("GRP");
            let _ = writeln!(
                out,
                "TIMESPEC \"TS{from}_to_{to}\" = FROM \"{from_group}\" TO \"{to_group}\" TIG;"
            );
            writeln!(
                out,
                "TIMESPEC \"TS{to}_to_{from}\" = FROM \"{to_group}\" TO \"{from_group}\" TIG;"
            )
        }
    };
}

fn render_xdc(out: &mut String, constraint: &Constraint) {
    let _ = match constraint {
        Constraint::LocationLock { primitive, site } => writeln!(
            out,
            "set_property LOC {site} [get_cells -hierarchical -filter {{REF_NAME == {primitive}}}]"
        ),
        Constraint::DisableDedicatedRoute { pin, .. } => writeln!(
            out,
            "set_property CLOCK_DEDICATED_ROUTE FALSE [get_nets -of_objects [get_pins {}]]",
            pin.replacen('.', "/", 1)
        ),
        Constraint::TimingGroup { net, group, .. } => {
            writeln!(out, "# {group}: {net}")
        }
        Constraint::FalsePath {
            from_net, to_net, ..
        } => writeln!(
            out,
            "set_clock_groups -asynchronous -group [get_clocks -of_objects [get_nets {from_net}]] -group [get_clocks -of_objects [get_nets {to_net}]]"
        ),
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{BorrowPolicy, ClockArbiter, ClockClass};
    use crate::constraint::emit;
    use vidsoc_platform::{ClockGenerator, ResourceKind, ResourcePool, SystemClock};

    fn shared_outputs() -> ConstraintSet {
        let pool = ResourcePool::new(
            ResourceKind::ClockGenerator,
            vec![ClockGenerator::new("PLL_ADV", "PLL_ADV_X0Y0")],
        )
        .unwrap();
        let mut arb = ClockArbiter::new(pool, BorrowPolicy::default());
        arb.request("hdmi_out0", ClockClass::VideoOutput).unwrap();
        arb.request("hdmi_out1", ClockClass::VideoOutput).unwrap();
        let sys = SystemClock {
            net: "sys_clk".into(),
            frequency_hz: 50_000_000,
        };
        emit(&arb.finalize(), &sys)
    }

    #[test]
    fn ucf_text() {
        let text = render(&shared_outputs(), ConstraintFormat::Ucf);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "INST PLL_ADV LOC=PLL_ADV_X0Y0;");
        assert_eq!(
            lines[1],
            "PIN \"hdmi_out1_pix_bufg.O\" CLOCK_DEDICATED_ROUTE = FALSE;"
        );
        assert_eq!(
            lines[2],
            "NET \"hdmi_out0_pix_clk\" TNM_NET = \"GRPhdmi_out0_pix\";"
        );
        assert_eq!(
            text.matches("NET \"sys_clk\" TNM_NET = \"GRPsys_clk\";").count(),
            1
        );
        assert_eq!(text.matches(" TIG;").count(), 4);
        assert!(text.contains(
            "TIMESPEC \"TSsys_clk_to_hdmi_out1_pix\" = FROM \"GRPsys_clk\" TO \"GRPhdmi_out1_pix\" TIG;"
        ));
    }

    #[test]
    fn xdc_text() {
        let text = render(&shared_outputs(), ConstraintFormat::Xdc);
        assert!(text.contains("set_property LOC PLL_ADV_X0Y0"));
        assert!(text.contains("[get_pins hdmi_out1_pix_bufg/O]"));
        assert_eq!(text.matches("set_clock_groups -asynchronous").count(), 2);
    }

    #[test]
    fn parse_format() {
        assert_eq!("UCF".parse::<ConstraintFormat>(), Ok(ConstraintFormat::Ucf));
        assert_eq!("xdc".parse::<ConstraintFormat>(), Ok(ConstraintFormat::Xdc));
        assert!("sdc".parse::<ConstraintFormat>().is_err());
        assert_eq!(ConstraintFormat::Xdc.extension(), "xdc");
    }

    #[test]
    fn empty_set_renders_nothing() {
        assert!(render(&ConstraintSet::default(), ConstraintFormat::Ucf).is_empty());
    }
}
