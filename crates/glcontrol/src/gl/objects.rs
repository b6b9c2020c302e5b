//! Single-object create/delete/free helpers over batch-native GPU object APIs
//!
//! The native API allocates and destroys objects in batches (array + count),
//! while call sites always operate on one object. These helpers reduce the
//! batch contract to single-object semantics and enforce one idempotent-free
//! discipline across every object kind: a freed handle becomes `None`, and
//! freeing `None` is a no-op.
//!
//! All operations require a current GPU context. This layer does not check
//! for one; the underlying driver's behavior governs.

/// Kinds of GPU objects managed through the batch-native API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// Vertex/index/uniform data buffer
    Buffer,
    /// Vertex array object
    VertexArray,
    /// Texture object
    Texture,
    /// Renderbuffer object
    Renderbuffer,
    /// Framebuffer object
    Framebuffer,
    /// Occlusion/timer query object
    Query,
}

/// Handle to a GPU-resident object
///
/// Opaque numeric identifier recognized by the context that created it.
/// "No object" is expressed as `Option<Handle>`; the free helpers take
/// `&mut Option<Handle>` and leave `None` behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(u32);

impl Handle {
    /// Get the raw object name for passing to the native API
    pub fn raw(self) -> u32 {
        self.0
    }
}

/// Batch-oriented native GPU object API
///
/// Implemented by platform drivers; test code substitutes a recording stub.
pub trait GlObjects {
    /// Allocate `count` objects of the given kind, returning their raw names
    fn gen_objects(&mut self, kind: ObjectKind, count: usize) -> Vec<u32>;

    /// Destroy the named objects of the given kind
    fn delete_objects(&mut self, kind: ObjectKind, names: &[u32]);
}

/// Allocate exactly one object of the given kind
///
/// Never returns a null handle on success; the native allocation itself
/// cannot fail short of driver loss.
pub fn create_object(gl: &mut dyn GlObjects, kind: ObjectKind) -> Handle {
    let names = gl.gen_objects(kind, 1);
    debug_assert_eq!(names.len(), 1, "batch API returned wrong object count");
    Handle(names[0])
}

/// Destroy exactly one object
///
/// Undefined if the handle was already deleted; callers wanting safety use
/// the matching `free_*` helper instead.
pub fn delete_object(gl: &mut dyn GlObjects, kind: ObjectKind, handle: Handle) {
    gl.delete_objects(kind, &[handle.raw()]);
}

/// Destroy the object behind `handle` and set it to `None`; no-op on `None`
pub fn free_object(gl: &mut dyn GlObjects, kind: ObjectKind, handle: &mut Option<Handle>) {
    if let Some(live) = handle.take() {
        delete_object(gl, kind, live);
    }
}

/// Allocate one buffer object
pub fn create_buffer(gl: &mut dyn GlObjects) -> Handle {
    create_object(gl, ObjectKind::Buffer)
}

/// Destroy one buffer object
pub fn delete_buffer(gl: &mut dyn GlObjects, handle: Handle) {
    delete_object(gl, ObjectKind::Buffer, handle);
}

/// Free a buffer handle, leaving `None`; idempotent
pub fn free_buffer(gl: &mut dyn GlObjects, handle: &mut Option<Handle>) {
    free_object(gl, ObjectKind::Buffer, handle);
}

/// Allocate one vertex array object
pub fn create_vertex_array(gl: &mut dyn GlObjects) -> Handle {
    create_object(gl, ObjectKind::VertexArray)
}

/// Destroy one vertex array object
pub fn delete_vertex_array(gl: &mut dyn GlObjects, handle: Handle) {
    delete_object(gl, ObjectKind::VertexArray, handle);
}

/// Free a vertex array handle, leaving `None`; idempotent
pub fn free_vertex_array(gl: &mut dyn GlObjects, handle: &mut Option<Handle>) {
    free_object(gl, ObjectKind::VertexArray, handle);
}

/// Allocate one texture object
pub fn create_texture(gl: &mut dyn GlObjects) -> Handle {
    create_object(gl, ObjectKind::Texture)
}

/// Destroy one texture object
pub fn delete_texture(gl: &mut dyn GlObjects, handle: Handle) {
    delete_object(gl, ObjectKind::Texture, handle);
}

/// Free a texture handle, leaving `None`; idempotent
pub fn free_texture(gl: &mut dyn GlObjects, handle: &mut Option<Handle>) {
    free_object(gl, ObjectKind::Texture, handle);
}

/// Allocate one renderbuffer object
pub fn create_renderbuffer(gl: &mut dyn GlObjects) -> Handle {
    create_object(gl, ObjectKind::Renderbuffer)
}

/// Destroy one renderbuffer object
pub fn delete_renderbuffer(gl: &mut dyn GlObjects, handle: Handle) {
    delete_object(gl, ObjectKind::Renderbuffer, handle);
}

/// Free a renderbuffer handle, leaving `None`; idempotent
pub fn free_renderbuffer(gl: &mut dyn GlObjects, handle: &mut Option<Handle>) {
    free_object(gl, ObjectKind::Renderbuffer, handle);
}

/// Allocate one framebuffer object
pub fn create_framebuffer(gl: &mut dyn GlObjects) -> Handle {
    create_object(gl, ObjectKind::Framebuffer)
}

/// Destroy one framebuffer object
pub fn delete_framebuffer(gl: &mut dyn GlObjects, handle: Handle) {
    delete_object(gl, ObjectKind::Framebuffer, handle);
}

/// Free a framebuffer handle, leaving `None`; idempotent
pub fn free_framebuffer(gl: &mut dyn GlObjects, handle: &mut Option<Handle>) {
    free_object(gl, ObjectKind::Framebuffer, handle);
}

/// Allocate one query object
pub fn create_query(gl: &mut dyn GlObjects) -> Handle {
    create_object(gl, ObjectKind::Query)
}

/// Destroy one query object
pub fn delete_query(gl: &mut dyn GlObjects, handle: Handle) {
    delete_object(gl, ObjectKind::Query, handle);
}

/// Free a query handle, leaving `None`; idempotent
pub fn free_query(gl: &mut dyn GlObjects, handle: &mut Option<Handle>) {
    free_object(gl, ObjectKind::Query, handle);
}
