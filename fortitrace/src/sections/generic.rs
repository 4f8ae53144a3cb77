use conftree_core::BlockBody;

use super::{HandlerContext, HandlerError, SectionHandler};
use crate::model::RawSection;

/// Keeps any section without a typed handler.
///
/// A section seen twice in one scope is merged: entries are appended and
/// settings fields are overlaid.
pub struct GenericSection;

impl SectionHandler for GenericSection {
    fn apply(
        &self,
        body: BlockBody,
        ctx: &mut HandlerContext<'_, '_, '_>,
    ) -> Result<(), HandlerError> {
        let Some(existing) = ctx.model.unhandled.get_mut(&ctx.section) else {
            let raw = RawSection {
                name: ctx.raw_name.clone(),
                body,
            };
            ctx.model.unhandled.insert(ctx.section.clone(), raw);
            return Ok(());
        };
        match (&mut existing.body, body) {
            (BlockBody::Entries(old), BlockBody::Entries(new)) => old.extend(new),
            (BlockBody::Settings(old), BlockBody::Settings(new)) => {
                for (key, value) in new.iter() {
                    old.insert(key.clone(), value.clone());
                }
            }
            (slot, body) => *slot = body,
        }
        Ok(())
    }
}
