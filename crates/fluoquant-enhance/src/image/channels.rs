//! Per-channel application of single-channel stage functions.

use super::{ImageBuffer, PixelData, PixelType};
use crate::error::EnhanceError;

/// Split an interleaved buffer into single-channel planes, in source order.
pub fn split_channels(image: &ImageBuffer) -> Vec<ImageBuffer> {
    let channels = image.channels;
    (0..channels)
        .map(|c| {
            let data = match &image.data {
                PixelData::U8(v) => PixelData::U8(deinterleave(v, channels, c)),
                PixelData::U16(v) => PixelData::U16(deinterleave(v, channels, c)),
                PixelData::F32(v) => PixelData::F32(deinterleave(v, channels, c)),
            };
            ImageBuffer {
                width: image.width,
                height: image.height,
                channels: 1,
                data,
            }
        })
        .collect()
}

/// Recombine single-channel planes into one interleaved buffer.
///
/// All planes must be single-channel with identical dimensions and element
/// type.
pub fn merge_channels(planes: &[ImageBuffer]) -> Result<ImageBuffer, EnhanceError> {
    let first = planes
        .first()
        .ok_or_else(|| EnhanceError::ChannelMismatch("no planes to merge".to_string()))?;

    for (i, plane) in planes.iter().enumerate() {
        if plane.channels != 1 {
            return Err(EnhanceError::ChannelMismatch(format!(
                "plane {} has {} channels",
                i, plane.channels
            )));
        }
        if plane.width != first.width || plane.height != first.height {
            return Err(EnhanceError::ChannelMismatch(format!(
                "plane {} is {}x{}, expected {}x{}",
                i, plane.width, plane.height, first.width, first.height
            )));
        }
        if plane.pixel_type() != first.pixel_type() {
            return Err(EnhanceError::ChannelMismatch(format!(
                "plane {} is {:?}, expected {:?}",
                i,
                plane.pixel_type(),
                first.pixel_type()
            )));
        }
    }

    let data = match first.pixel_type() {
        PixelType::U8 => {
            let slices: Vec<&[u8]> = planes.iter().filter_map(|p| p.data.as_u8()).collect();
            PixelData::U8(interleave(&slices))
        }
        PixelType::U16 => {
            let slices: Vec<&[u16]> = planes.iter().filter_map(|p| p.data.as_u16()).collect();
            PixelData::U16(interleave(&slices))
        }
        PixelType::F32 => {
            let slices: Vec<&[f32]> = planes.iter().filter_map(|p| p.data.as_f32()).collect();
            PixelData::F32(interleave(&slices))
        }
    };

    Ok(ImageBuffer {
        width: first.width,
        height: first.height,
        channels: planes.len(),
        data,
    })
}

/// Apply `f` to every channel independently and recombine in order.
///
/// Single-channel input is handed to `f` directly. The first error aborts
/// the call.
pub fn map_channels<F>(image: &ImageBuffer, mut f: F) -> Result<ImageBuffer, EnhanceError>
where
    F: FnMut(&ImageBuffer) -> Result<ImageBuffer, EnhanceError>,
{
    if image.channels == 1 {
        return f(image);
    }
    let planes = split_channels(image)
        .iter()
        .map(&mut f)
        .collect::<Result<Vec<_>, _>>()?;
    merge_channels(&planes)
}

fn deinterleave<T: Copy>(data: &[T], channels: usize, channel: usize) -> Vec<T> {
    data.iter().skip(channel).step_by(channels).copied().collect()
}

fn interleave<T: Copy>(planes: &[&[T]]) -> Vec<T> {
    let len = planes.first().map_or(0, |p| p.len());
    let mut out = Vec::with_capacity(len * planes.len());
    for i in 0..len {
        for plane in planes {
            out.push(plane[i]);
        }
    }
    out
}
