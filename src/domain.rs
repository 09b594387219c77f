//! Rewrites the firmware references of a libvirt domain definition.
//!
//! The domain XML arrives fully populated by the management layer; this hook
//! only owns two entries under `<os>`: the `<loader>` path and the
//! `<nvram>` template attribute. The rewrite therefore streams quick-xml
//! events and passes every node it does not own through to the output
//! unmodified, instead of deserializing into a typed model that would drop
//! whatever it fails to declare.

use anyhow::{Context, Result};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::firmware;
use crate::vmi::FirmwareChoice;

const MALFORMED: &str = "malformed domain XML";

impl FirmwareChoice {
    /// Staged (code, vars) destination paths, or `None` for a non-EFI boot.
    fn staged_paths(self) -> Option<(&'static str, &'static str)> {
        match self {
            FirmwareChoice::None => None,
            FirmwareChoice::Standard => {
                Some((firmware::OVMF_CODE_PATH, firmware::OVMF_VARS_PATH))
            }
            FirmwareChoice::SecureBoot => Some((
                firmware::OVMF_CODE_SECBOOT_PATH,
                firmware::OVMF_VARS_SECBOOT_PATH,
            )),
        }
    }
}

/// Point the domain's `<os><loader>` and `<os><nvram>` entries at the
/// staged OVMF images for `choice`. [`FirmwareChoice::None`] leaves the
/// document untouched apart from the round trip itself.
pub fn rewrite(domain_xml: &str, choice: FirmwareChoice) -> Result<String> {
    let mut reader = Reader::from_str(domain_xml);
    let mut writer = Writer::new(Vec::new());

    let Some((code_path, vars_path)) = choice.staged_paths() else {
        // Still round-trip the document so malformed input is rejected the
        // same way on every path.
        loop {
            match reader.read_event().context(MALFORMED)? {
                Event::Eof => break,
                event => writer.write_event(event)?,
            }
        }
        return into_xml(writer);
    };

    let mut in_os = false;
    let mut saw_loader = false;
    let mut saw_nvram = false;

    loop {
        match reader.read_event().context(MALFORMED)? {
            Event::Start(elem) if !in_os && elem.local_name().as_ref() == b"os" => {
                in_os = true;
                saw_loader = false;
                saw_nvram = false;
                writer.write_event(Event::Start(elem))?;
            }
            Event::Empty(elem) if !in_os && elem.local_name().as_ref() == b"os" => {
                // Nothing to preserve inside; emit a fully populated section.
                writer.write_event(Event::Start(elem))?;
                write_loader(&mut writer, code_path)?;
                write_nvram(&mut writer, vars_path)?;
                writer.write_event(Event::End(BytesEnd::new("os")))?;
            }
            Event::End(elem) if in_os && elem.local_name().as_ref() == b"os" => {
                if !saw_loader {
                    write_loader(&mut writer, code_path)?;
                }
                if !saw_nvram {
                    write_nvram(&mut writer, vars_path)?;
                }
                in_os = false;
                writer.write_event(Event::End(elem))?;
            }
            Event::Start(elem) if in_os && elem.local_name().as_ref() == b"loader" => {
                saw_loader = true;
                // Drop the original path but keep the readonly/secure/type
                // attributes as parsed.
                reader.read_to_end(elem.name()).context(MALFORMED)?;
                writer.write_event(Event::Start(elem))?;
                writer.write_event(Event::Text(BytesText::new(code_path)))?;
                writer.write_event(Event::End(BytesEnd::new("loader")))?;
            }
            Event::Empty(elem) if in_os && elem.local_name().as_ref() == b"loader" => {
                saw_loader = true;
                writer.write_event(Event::Start(elem))?;
                writer.write_event(Event::Text(BytesText::new(code_path)))?;
                writer.write_event(Event::End(BytesEnd::new("loader")))?;
            }
            Event::Start(elem) if in_os && elem.local_name().as_ref() == b"nvram" => {
                saw_nvram = true;
                // The element text is the per-VM NVRAM copy; only the
                // template attribute belongs to this hook.
                writer.write_event(Event::Start(with_template(&elem, vars_path)?))?;
            }
            Event::Empty(elem) if in_os && elem.local_name().as_ref() == b"nvram" => {
                saw_nvram = true;
                writer.write_event(Event::Empty(with_template(&elem, vars_path)?))?;
            }
            Event::Eof => break,
            event => writer.write_event(event)?,
        }
    }

    into_xml(writer)
}

/// Copy of `elem` with its `template` attribute replaced by `vars_path`.
fn with_template(elem: &BytesStart, vars_path: &str) -> Result<BytesStart<'static>> {
    let mut nvram = BytesStart::new("nvram");
    for attr in elem.attributes() {
        let attr = attr.context(MALFORMED)?;
        if attr.key.as_ref() != b"template" {
            nvram.push_attribute(attr);
        }
    }
    nvram.push_attribute(("template", vars_path));
    Ok(nvram)
}

fn write_loader(writer: &mut Writer<Vec<u8>>, code_path: &str) -> std::io::Result<()> {
    writer.write_event(Event::Start(BytesStart::new("loader")))?;
    writer.write_event(Event::Text(BytesText::new(code_path)))?;
    writer.write_event(Event::End(BytesEnd::new("loader")))
}

fn write_nvram(writer: &mut Writer<Vec<u8>>, vars_path: &str) -> std::io::Result<()> {
    let mut nvram = BytesStart::new("nvram");
    nvram.push_attribute(("template", vars_path));
    writer.write_event(Event::Empty(nvram))
}

fn into_xml(writer: Writer<Vec<u8>>) -> Result<String> {
    String::from_utf8(writer.into_inner()).context("rewritten domain XML is not valid UTF-8")
}
