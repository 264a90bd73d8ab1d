// SPDX-License-Identifier: CEPL-1.0
use crate::device::CommandEncoder;
use crate::error::FrameResult;
use crate::scene::SceneSnapshot;
use crate::types::{ClearValues, Extent, ImageIndex};

/// Records one frame into `encoder`: a single render pass over `image`'s
/// framebuffer with one draw per snapshot object, in snapshot order.
///
/// Returns the number of draws issued.
pub fn record_frame<E: CommandEncoder>(
    encoder: &mut E,
    image: ImageIndex,
    extent: Extent,
    clear: &ClearValues,
    scene: &SceneSnapshot,
) -> FrameResult<usize> {
    encoder.begin()?;
    encoder.begin_render_pass(image, clear)?;

    encoder.set_viewport(extent);
    encoder.set_scissor(extent);
    encoder.bind_pipeline();

    for object in &scene.objects {
        encoder.push_constants(&object.push_constants());
        encoder.draw_mesh(object.mesh)?;
    }

    encoder.end_render_pass();
    encoder.end()?;
    Ok(scene.objects.len())
}
