//! Instruction rendering.
//!
//! The formatter turns decoded instructions into listing text. Operands
//! that resolve to a named address render the symbol instead of the raw
//! value; resolved-but-unnamed reference targets render as `loc_<addr>`
//! labels. A plugin-supplied hook gets first refusal before the builtin
//! path, and blocks that failed to decode always render through the
//! fallback path, which cannot fail.

use crate::core::instruction::{Instruction, Operand};
use crate::listing::Listing;

/// Raw bytes rendered by the fallback path before truncation.
const MAX_FALLBACK_BYTES: usize = 16;

/// Plugin-supplied renderer consulted by
/// [`InstructionFormatter::format_instruction_custom`]. Returning `None`
/// declines the instruction and falls through to the builtin path.
pub trait RenderHook {
    fn render(&self, listing: &Listing<'_>, instruction: &Instruction) -> Option<String>;
}

/// Renders instructions using the listing's symbol and reference tables.
#[derive(Default)]
pub struct InstructionFormatter {
    hook: Option<Box<dyn RenderHook>>,
}

impl InstructionFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Formatter with a plugin renderer installed.
    pub fn with_hook(hook: Box<dyn RenderHook>) -> Self {
        Self { hook: Some(hook) }
    }

    /// Render `instruction` as mnemonic plus comma-separated operands.
    /// Invalid instructions route to the fallback path.
    pub fn format_instruction(&self, listing: &Listing<'_>, instruction: &Instruction) -> String {
        if !instruction.is_valid() {
            return self.format_invalid_instruction(listing, instruction);
        }

        let mut text = instruction.mnemonic.clone();
        for (i, operand) in instruction.operands.iter().enumerate() {
            text.push_str(if i == 0 { " " } else { ", " });
            text.push_str(&self.format_operand(listing, operand));
        }
        text
    }

    /// Render one operand, consulting the symbol and reference tables.
    pub fn format_operand(&self, listing: &Listing<'_>, operand: &Operand) -> String {
        if let Some(target) = operand.target_address(listing.address_bits()) {
            if let Some(symbol) = listing.symbol_table().get(&target) {
                return symbol.name.clone();
            }
            if listing.reference_table().is_referenced(&target) {
                return format!("loc_{:x}", target.value);
            }
        }
        operand.text.clone()
    }

    /// Give the plugin hook first refusal, falling back to the builtin
    /// path when it declines or none is installed.
    pub fn format_instruction_custom(
        &self,
        listing: &Listing<'_>,
        instruction: &Instruction,
    ) -> String {
        if let Some(hook) = &self.hook {
            if let Some(text) = hook.render(listing, instruction) {
                return text;
            }
        }
        self.format_instruction(listing, instruction)
    }

    /// Fixed fallback rendering for blocks that failed to decode: raw
    /// bytes with an explicit invalid marker. Never fails; unreadable
    /// bytes degrade to `??` placeholders.
    pub fn format_invalid_instruction(
        &self,
        listing: &Listing<'_>,
        instruction: &Instruction,
    ) -> String {
        let span = usize::try_from(instruction.size())
            .unwrap_or(MAX_FALLBACK_BYTES)
            .clamp(1, MAX_FALLBACK_BYTES);
        let mut text = String::from("db ");
        match listing.read_bytes(instruction.address, span) {
            Some(bytes) if !bytes.is_empty() => {
                for (i, byte) in bytes.iter().enumerate() {
                    if i > 0 {
                        text.push(' ');
                    }
                    text.push_str(&format!("{:02x}", byte));
                }
            }
            _ => {
                for i in 0..span {
                    if i > 0 {
                        text.push(' ');
                    }
                    text.push_str("??");
                }
            }
        }
        text.push_str(" ; (invalid)");
        text
    }
}
