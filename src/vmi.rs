//! The slice of the VirtualMachineInstance object this hook inspects.
//!
//! Only the firmware preferences under `spec.domain.firmware` matter here;
//! serde ignores everything else in the VMI JSON.

use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct VirtualMachineInstance {
    #[serde(default)]
    pub spec: VirtualMachineInstanceSpec,
}

#[derive(Debug, Default, Deserialize)]
pub struct VirtualMachineInstanceSpec {
    #[serde(default)]
    pub domain: DomainSpec,
}

#[derive(Debug, Default, Deserialize)]
pub struct DomainSpec {
    pub firmware: Option<Firmware>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Firmware {
    pub bootloader: Option<Bootloader>,
}

/// Boot method requested by the VMI. `bios` and `efi` are mutually
/// exclusive in practice, but nothing here depends on that.
#[derive(Debug, Default, Deserialize)]
pub struct Bootloader {
    pub bios: Option<Bios>,
    pub efi: Option<Efi>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Bios {}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Efi {
    pub secure_boot: Option<bool>,
}

/// Which staged OVMF pair the domain should boot from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirmwareChoice {
    /// The VMI does not boot through EFI; leave the domain alone.
    None,
    Standard,
    SecureBoot,
}

impl FirmwareChoice {
    /// Decide which firmware pair the VMI's boot configuration calls for.
    ///
    /// An absent `efi` block at any level means "not an EFI boot", which is
    /// distinct from `secureBoot: false`: the latter still selects the
    /// standard EFI pair.
    pub fn select(firmware: Option<&Firmware>) -> Self {
        match firmware
            .and_then(|firmware| firmware.bootloader.as_ref())
            .and_then(|bootloader| bootloader.efi.as_ref())
        {
            Some(efi) if efi.secure_boot.unwrap_or(false) => FirmwareChoice::SecureBoot,
            Some(_) => FirmwareChoice::Standard,
            None => FirmwareChoice::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn select_from(vmi_json: &str) -> FirmwareChoice {
        let vmi: VirtualMachineInstance = serde_json::from_str(vmi_json).unwrap();
        FirmwareChoice::select(vmi.spec.domain.firmware.as_ref())
    }

    #[test]
    fn test_secure_boot_true_selects_secboot_pair() {
        assert_eq!(
            select_from(
                r#"{"spec": {"domain": {"firmware": {"bootloader": {"efi": {"secureBoot": true}}}}}}"#
            ),
            FirmwareChoice::SecureBoot
        );
    }

    #[test]
    fn test_secure_boot_false_selects_standard_pair() {
        assert_eq!(
            select_from(
                r#"{"spec": {"domain": {"firmware": {"bootloader": {"efi": {"secureBoot": false}}}}}}"#
            ),
            FirmwareChoice::Standard
        );
    }

    #[test]
    fn test_absent_secure_boot_flag_selects_standard_pair() {
        assert_eq!(
            select_from(r#"{"spec": {"domain": {"firmware": {"bootloader": {"efi": {}}}}}}"#),
            FirmwareChoice::Standard
        );
    }

    #[test]
    fn test_bios_bootloader_selects_none() {
        assert_eq!(
            select_from(r#"{"spec": {"domain": {"firmware": {"bootloader": {"bios": {}}}}}}"#),
            FirmwareChoice::None
        );
    }

    #[test]
    fn test_empty_bootloader_selects_none() {
        assert_eq!(
            select_from(r#"{"spec": {"domain": {"firmware": {"bootloader": {}}}}}"#),
            FirmwareChoice::None
        );
    }

    #[test]
    fn test_firmware_without_bootloader_selects_none() {
        assert_eq!(
            select_from(r#"{"spec": {"domain": {"firmware": {}}}}"#),
            FirmwareChoice::None
        );
    }

    #[test]
    fn test_missing_firmware_selects_none() {
        assert_eq!(select_from(r#"{"spec": {"domain": {}}}"#), FirmwareChoice::None);
    }

    #[test]
    fn test_empty_vmi_selects_none() {
        assert_eq!(select_from("{}"), FirmwareChoice::None);
    }

    #[test]
    fn test_unrelated_vmi_fields_are_ignored() {
        assert_eq!(
            select_from(
                r#"{
                    "apiVersion": "kubevirt.io/v1",
                    "kind": "VirtualMachineInstance",
                    "metadata": {"name": "efi-vm"},
                    "spec": {
                        "domain": {
                            "devices": {"disks": []},
                            "firmware": {"bootloader": {"efi": {"secureBoot": true}}}
                        }
                    }
                }"#
            ),
            FirmwareChoice::SecureBoot
        );
    }
}
