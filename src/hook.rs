//! The `onDefineDomain` hook: given the VMI and the domain definition the
//! management layer is about to apply, return the domain XML patched to
//! boot from the staged firmware.

use anyhow::{Context, Result};
use tracing::debug;

use crate::domain;
use crate::vmi::{FirmwareChoice, VirtualMachineInstance};

pub fn on_define_domain(vmi_json: &str, domain_xml: &str) -> Result<String> {
    let vmi: VirtualMachineInstance =
        serde_json::from_str(vmi_json).context("malformed VMI JSON")?;

    let choice = FirmwareChoice::select(vmi.spec.domain.firmware.as_ref());
    debug!(?choice, "Selected firmware");

    domain::rewrite(domain_xml, choice)
}
