//! Operand-to-reference classification.
//!
//! When operand analysis resolves an operand to an in-segment address,
//! the reference type is inferred from how the operand is used: control
//! transfers produce call/jump edges, everything else is typed by the
//! operand's access direction.

use crate::core::instruction::{Access, InstructionCategory};
use crate::core::reference::ReferenceKind;

/// Reference type for an operand of a `category` instruction used with
/// the given `access`.
pub fn reference_kind(category: InstructionCategory, access: Access) -> ReferenceKind {
    match category {
        InstructionCategory::Call => ReferenceKind::Call,
        InstructionCategory::Jump | InstructionCategory::ConditionalJump => ReferenceKind::Jump,
        _ => {
            if access.is_write() {
                ReferenceKind::Write
            } else {
                ReferenceKind::Read
            }
        }
    }
}
