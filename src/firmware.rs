use anyhow::{Context, Result};
use std::fs::{self, Permissions};
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use tracing::debug;

/// Runtime directory shared between hook sidecars and virt-launcher. It is
/// mounted into both containers by the infrastructure, so staging never
/// creates it.
pub const HOOK_DIR: &str = "/var/run/kubevirt-hooks";

pub const OVMF_CODE_PATH: &str = "/var/run/kubevirt-hooks/OVMF_CODE.fd";
pub const OVMF_VARS_PATH: &str = "/var/run/kubevirt-hooks/OVMF_VARS.fd";
pub const OVMF_CODE_SECBOOT_PATH: &str = "/var/run/kubevirt-hooks/OVMF_CODE.secboot.fd";
pub const OVMF_VARS_SECBOOT_PATH: &str = "/var/run/kubevirt-hooks/OVMF_VARS.secboot.fd";

/// One OVMF image bundled into the binary at build time.
pub struct FirmwareImage {
    /// File name under [`HOOK_DIR`].
    pub file_name: &'static str,
    /// Raw image contents, treated as an opaque blob.
    pub image: &'static [u8],
}

/// Every image staged on each invocation: the standard code/vars pair and
/// its secure boot counterpart.
pub const IMAGES: [FirmwareImage; 4] = [
    FirmwareImage {
        file_name: "OVMF_CODE.fd",
        image: include_bytes!("../res/OVMF_CODE.fd"),
    },
    FirmwareImage {
        file_name: "OVMF_VARS.fd",
        image: include_bytes!("../res/OVMF_VARS.fd"),
    },
    FirmwareImage {
        file_name: "OVMF_CODE.secboot.fd",
        image: include_bytes!("../res/OVMF_CODE.secboot.fd"),
    },
    FirmwareImage {
        file_name: "OVMF_VARS.secboot.fd",
        image: include_bytes!("../res/OVMF_VARS.secboot.fd"),
    },
];

/// Copy every bundled OVMF image into the hook directory, truncating any
/// copy left behind by a previous invocation. Stops at the first write that
/// fails.
pub fn stage() -> Result<()> {
    stage_into(Path::new(HOOK_DIR))
}

pub fn stage_into(dir: &Path) -> Result<()> {
    for firmware in &IMAGES {
        let dest = dir.join(firmware.file_name);
        debug!(dest = %dest.display(), size = firmware.image.len(), "Staging firmware image");

        fs::write(&dest, firmware.image)
            .with_context(|| format!("failed to write {}", dest.display()))?;

        // virt-launcher runs under a different UID than this sidecar, so the
        // staged files must stay readable and writable for it regardless of
        // our umask.
        fs::set_permissions(&dest, Permissions::from_mode(0o666))
            .with_context(|| format!("failed to set permissions on {}", dest.display()))?;
    }
    Ok(())
}
