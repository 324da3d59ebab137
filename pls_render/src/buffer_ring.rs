// Copyright 2024 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Triple-buffered GPU resource rings.
//!
//! The render context writes every flush's data into the next buffer of a
//! ring, so the CPU never overwrites a buffer the GPU may still be reading.

use std::any::Any;
use std::marker::PhantomData;

use bytemuck::Pod;
use pls_encoding::limits::BUFFER_RING_SIZE;

/// Backend side of a resource ring.
///
/// A ring holds [`BUFFER_RING_SIZE`] buffers of `capacity` items each. The
/// render context maps one buffer at a time, writes into it through
/// [`mapped_bytes`](Self::mapped_bytes), then unmaps and submits it.
pub trait BufferRingImpl: Any {
    /// Capacity of each buffer, in items.
    fn capacity(&self) -> usize;

    fn item_size_in_bytes(&self) -> usize;

    /// Prepares buffer `buffer_idx` for CPU writes.
    fn map_buffer(&mut self, buffer_idx: usize);

    /// The writable contents of the currently mapped buffer,
    /// `capacity * item_size_in_bytes` long.
    fn mapped_bytes(&mut self) -> &mut [u8];

    /// Finishes CPU writes to buffer `buffer_idx` and makes its first
    /// `bytes_written` bytes visible to the GPU.
    fn unmap_and_submit_buffer(&mut self, buffer_idx: usize, bytes_written: usize);

    /// Lets backends recover their concrete ring type at flush time.
    fn as_any(&self) -> &dyn Any;
}

/// A typed, write-only view of a [`BufferRingImpl`].
pub struct BufferRing<T> {
    ring: Option<Box<dyn BufferRingImpl>>,
    submitted_buffer_idx: usize,
    mapped: bool,
    bytes_written: usize,
    _phantom: PhantomData<T>,
}

impl<T: Pod> Default for BufferRing<T> {
    fn default() -> Self {
        Self {
            ring: None,
            submitted_buffer_idx: BUFFER_RING_SIZE - 1,
            mapped: false,
            bytes_written: 0,
            _phantom: PhantomData,
        }
    }
}

impl<T: Pod> BufferRing<T> {
    /// Replaces the backing ring. Nothing may be mapped.
    pub fn reset(&mut self, ring: Box<dyn BufferRingImpl>) {
        debug_assert!(!self.mapped);
        debug_assert_eq!(ring.item_size_in_bytes(), std::mem::size_of::<T>());
        self.ring = Some(ring);
        self.submitted_buffer_idx = BUFFER_RING_SIZE - 1;
        self.bytes_written = 0;
    }

    /// Capacity of each buffer in the ring, in items.
    pub fn capacity(&self) -> usize {
        self.ring.as_ref().map_or(0, |ring| ring.capacity())
    }

    pub fn ring(&self) -> Option<&dyn BufferRingImpl> {
        self.ring.as_deref()
    }

    pub fn mapped(&self) -> bool {
        self.mapped
    }

    /// Maps the next buffer in the ring if nothing is mapped yet.
    pub fn ensure_mapped(&mut self) {
        if self.mapped {
            return;
        }
        let Some(ring) = self.ring.as_mut() else {
            debug_assert!(false, "mapping a ring that was never allocated");
            return;
        };
        self.submitted_buffer_idx = (self.submitted_buffer_idx + 1) % BUFFER_RING_SIZE;
        ring.map_buffer(self.submitted_buffer_idx);
        self.mapped = true;
        self.bytes_written = 0;
    }

    pub fn has_room_for(&self, item_count: usize) -> bool {
        self.items_written() + item_count <= self.capacity()
    }

    pub fn bytes_written(&self) -> usize {
        self.bytes_written
    }

    pub fn items_written(&self) -> usize {
        self.bytes_written / std::mem::size_of::<T>()
    }

    /// Appends one item to the mapped buffer.
    pub fn emplace_back(&mut self, item: T) {
        debug_assert!(self.mapped);
        debug_assert!(self.has_room_for(1));
        let Some(ring) = self.ring.as_mut() else {
            return;
        };
        let size = std::mem::size_of::<T>();
        let start = self.bytes_written;
        ring.mapped_bytes()[start..start + size].copy_from_slice(bytemuck::bytes_of(&item));
        self.bytes_written += size;
    }

    /// Unmaps the current buffer and hands it to the GPU. No-op if nothing is
    /// mapped.
    ///
    /// The write count restarts at zero, so rings left unmapped in a flush
    /// report nothing written.
    pub fn submit(&mut self) {
        if !self.mapped {
            return;
        }
        if let Some(ring) = self.ring.as_mut() {
            ring.unmap_and_submit_buffer(self.submitted_buffer_idx, self.bytes_written);
        }
        self.mapped = false;
        self.bytes_written = 0;
    }

    /// Index of the buffer most recently mapped (and, once submitted, the one
    /// the GPU should read).
    pub fn submitted_buffer_idx(&self) -> usize {
        self.submitted_buffer_idx
    }
}

/// Receives the contents of a [`BufferRingShadowImpl`] when it is submitted.
pub trait ShadowSubmit: 'static {
    fn on_unmap_and_submit_buffer(&mut self, buffer_idx: usize, data: &[u8]);
}

/// A ring for backends that cannot map GPU memory persistently.
///
/// Writes go to a single CPU shadow buffer; submitting hands the written
/// prefix to `S`, which copies it into buffer `buffer_idx` of the real ring.
pub struct BufferRingShadowImpl<S> {
    capacity: usize,
    item_size_in_bytes: usize,
    shadow: Vec<u8>,
    submitter: S,
}

impl<S: ShadowSubmit> BufferRingShadowImpl<S> {
    pub fn new(capacity: usize, item_size_in_bytes: usize, submitter: S) -> Self {
        Self {
            capacity,
            item_size_in_bytes,
            shadow: vec![0; capacity * item_size_in_bytes],
            submitter,
        }
    }

    pub fn submitter(&self) -> &S {
        &self.submitter
    }

    pub fn shadow(&self) -> &[u8] {
        &self.shadow
    }
}

impl<S: ShadowSubmit> BufferRingImpl for BufferRingShadowImpl<S> {
    fn capacity(&self) -> usize {
        self.capacity
    }

    fn item_size_in_bytes(&self) -> usize {
        self.item_size_in_bytes
    }

    fn map_buffer(&mut self, _buffer_idx: usize) {}

    fn mapped_bytes(&mut self) -> &mut [u8] {
        &mut self.shadow
    }

    fn unmap_and_submit_buffer(&mut self, buffer_idx: usize, bytes_written: usize) {
        self.submitter
            .on_unmap_and_submit_buffer(buffer_idx, &self.shadow[..bytes_written]);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Texel formats of texture-backed rings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    Rgba8,
    Rgba32f,
    Rgba32ui,
}

impl Format {
    pub fn bytes_per_texel(self) -> usize {
        match self {
            Self::Rgba8 => 4,
            Self::Rgba32f | Self::Rgba32ui => 16,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Filter {
    Nearest,
    Linear,
}

/// Which texture binding a texel ring feeds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureIndex {
    Gradient,
    Path,
    Contour,
}

/// Shape of a texture-backed ring.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TexelLayout {
    pub format: Format,
    /// The texture is also a render target (the complex gradient rows are
    /// drawn by the GPU).
    pub renderable: bool,
    pub width_in_items: usize,
    pub height: usize,
    pub texels_per_item: usize,
    pub texture_index: TextureIndex,
    pub filter: Filter,
}

impl TexelLayout {
    pub fn width_in_texels(&self) -> usize {
        self.width_in_items * self.texels_per_item
    }

    pub fn item_size_in_bytes(&self) -> usize {
        self.texels_per_item * self.format.bytes_per_texel()
    }

    pub fn capacity(&self) -> usize {
        self.width_in_items * self.height
    }
}

/// Uploads a rectangle of texels into one texture of a [`TexelBufferRing`].
pub trait TexelUploader: 'static {
    /// Copies the top-left `width_in_texels x height` rectangle of `texels`
    /// (rows of the ring's full width) into texture `texture_idx`.
    fn submit_texels(
        &mut self,
        texture_idx: usize,
        layout: &TexelLayout,
        width_in_texels: usize,
        height: usize,
        texels: &[u8],
    );
}

/// A ring whose storage is a 2D texture rather than a buffer.
///
/// Items are written linearly; on submit the written range is converted to
/// the smallest top-aligned rectangle of whole rows that contains it.
pub struct TexelBufferRing<U> {
    layout: TexelLayout,
    shadow: Vec<u8>,
    uploader: U,
}

impl<U: TexelUploader> TexelBufferRing<U> {
    pub fn new(layout: TexelLayout, uploader: U) -> Self {
        Self {
            shadow: vec![0; layout.capacity() * layout.item_size_in_bytes()],
            layout,
            uploader,
        }
    }

    pub fn layout(&self) -> &TexelLayout {
        &self.layout
    }

    pub fn format(&self) -> Format {
        self.layout.format
    }

    pub fn width_in_items(&self) -> usize {
        self.layout.width_in_items
    }

    pub fn width_in_texels(&self) -> usize {
        self.layout.width_in_texels()
    }

    pub fn height(&self) -> usize {
        self.layout.height
    }

    pub fn uploader(&self) -> &U {
        &self.uploader
    }
}

impl<U: TexelUploader> BufferRingImpl for TexelBufferRing<U> {
    fn capacity(&self) -> usize {
        self.layout.capacity()
    }

    fn item_size_in_bytes(&self) -> usize {
        self.layout.item_size_in_bytes()
    }

    fn map_buffer(&mut self, _buffer_idx: usize) {}

    fn mapped_bytes(&mut self) -> &mut [u8] {
        &mut self.shadow
    }

    fn unmap_and_submit_buffer(&mut self, buffer_idx: usize, bytes_written: usize) {
        let item_count = bytes_written / self.layout.item_size_in_bytes();
        if item_count == 0 {
            return;
        }
        let width_in_items = item_count.min(self.layout.width_in_items);
        let height = item_count.div_ceil(self.layout.width_in_items);
        let row_bytes = self.layout.width_in_texels() * self.layout.format.bytes_per_texel();
        self.uploader.submit_texels(
            buffer_idx,
            &self.layout,
            width_in_items * self.layout.texels_per_item,
            height,
            &self.shadow[..height * row_bytes],
        );
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
