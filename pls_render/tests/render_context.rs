// Copyright 2024 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! End-to-end behavior of the render context, observed through the
//! headless backend.

use std::sync::Arc;

use pls_render::kurbo::{Affine, BezPath, Cap, Point, Rect, Shape, Stroke, Vec2};
use pls_render::peniko::{BlendMode, Color, ColorStop, Compose, Fill, Mix};
use pls_render::pls_encoding::limits::{MIN_TESSELLATION_VERTICES, TESS_TEXTURE_WIDTH};
use pls_render::pls_encoding::{
    complex_ramp_span_count, contour_flags, DrawType, PaintData, PaintType, PatchType,
    PlsBlendMode,
};
use pls_render::{
    Brush, Draw, FillRule, FlushType, FrameDescriptor, Gradient, HeadlessBackend,
    HeadlessTexture, ImageTexture, LoadAction, Paint, PathDraw, PathParams, PathStyle,
    PlatformFeatures, RenderContext, Renderer, ResourceCounters, ShaderFeatures,
};

fn context() -> RenderContext<HeadlessBackend> {
    RenderContext::new(HeadlessBackend::default())
}

fn begin(context: &mut RenderContext<HeadlessBackend>) {
    context
        .begin_frame(FrameDescriptor::new(800, 600))
        .expect("valid render target");
}

fn rect(x: f64, y: f64, size: f64) -> BezPath {
    Rect::new(x, y, x + size, y + size).to_path(0.1)
}

fn black() -> Paint {
    Paint::new(Color::BLACK)
}

fn stop(offset: f32, color: Color) -> ColorStop {
    ColorStop { offset, color }
}

/// A two-stop ramp that is distinct for every `i` below 65536.
fn simple_gradient(i: usize) -> Gradient {
    let color = Color::rgba8(i as u8, (i >> 8) as u8, 0, 255);
    Gradient::new_linear(
        Point::ZERO,
        Point::new(10.0, 0.0),
        &[stop(0.0, color), stop(1.0, Color::BLACK)],
    )
    .unwrap()
}

/// A three-stop ramp that is distinct for every `i` below 65536.
fn complex_gradient(i: usize) -> Gradient {
    let color = Color::rgba8(i as u8, (i >> 8) as u8, 0, 255);
    Gradient::new_linear(
        Point::ZERO,
        Point::new(10.0, 0.0),
        &[
            stop(0.0, Color::WHITE),
            stop(0.5, color),
            stop(1.0, Color::BLACK),
        ],
    )
    .unwrap()
}

#[test]
fn rect_fill_round_trip() {
    let mut context = context();
    begin(&mut context);
    Renderer::new(&mut context)
        .fill(Fill::NonZero, Affine::IDENTITY, &black(), &rect(10.0, 10.0, 20.0))
        .unwrap();
    context.flush(FlushType::EndOfFrame).unwrap();

    let record = context.backend().last_flush().unwrap();
    assert_eq!(record.flush_type, FlushType::EndOfFrame);
    assert_eq!(record.load_action, LoadAction::Clear);
    assert_eq!(record.path_data.len(), 1);
    assert_eq!(record.contours.len(), 1);
    assert_eq!(record.contours[0].vertex_index0, 0);
    assert_eq!(record.contours[0].path_id, 1);

    // Four edges plus the end-of-flush marker.
    let spans = &record.tess_spans;
    assert_eq!(spans.len(), 5);
    assert_eq!(spans[0].contour_id(), 1);
    assert_ne!(spans[0].contour_id_with_flags & contour_flags::FIRST_VERTEX_OF_CONTOUR, 0);
    assert_eq!(spans[1].contour_id_with_flags & contour_flags::FIRST_VERTEX_OF_CONTOUR, 0);
    // The first edge also carries the contour's padding up to 8 vertices.
    assert_eq!((spans[0].x0(), spans[0].x1()), (0, 5));
    for pair in spans.windows(2) {
        assert_eq!(pair[0].x1(), pair[1].x0());
    }
    let marker = &spans[4];
    assert_eq!((marker.x0(), marker.x1()), (8, 9));
    assert_eq!(marker.contour_id(), 0);

    assert_eq!(record.draw_list.len(), 1);
    let batch = &record.draw_list[0];
    assert_eq!(batch.draw_type, DrawType::MidpointFanPatches);
    assert_eq!((batch.base_element, batch.element_count), (0, 1));
    assert_eq!(record.tess_data_height, 1);
}

#[test]
fn invalid_render_target_is_rejected() {
    let mut context = context();
    let result = context.begin_frame(FrameDescriptor::new(0, 600));
    assert!(matches!(
        result,
        Err(pls_render::Error::InvalidRenderTarget {
            width: 0,
            height: 600
        })
    ));
    assert!(context.frame_descriptor().is_none());
}

#[test]
fn clip_ids_are_monotonic_until_exhausted() {
    let mut context = context();
    begin(&mut context);
    let max = context.max_path_id();
    for expected in 1..=max {
        assert_eq!(context.generate_clip_id(), Some(expected));
    }
    assert_eq!(context.generate_clip_id(), None);
    context.flush(FlushType::EndOfFrame).unwrap();
    begin(&mut context);
    assert_eq!(context.generate_clip_id(), Some(1));
}

#[test]
fn path_id_granularity_lowers_the_id_ceiling() {
    let backend = HeadlessBackend::new(PlatformFeatures {
        path_id_granularity: 2,
        ..Default::default()
    });
    let context = RenderContext::new(backend);
    assert_eq!(context.max_path_id(), 14848);
    assert!(context.resource_limits().max_path_id <= 14848);
}

#[test]
fn gradients_are_deduplicated_per_flush() {
    let mut context = context();
    begin(&mut context);
    let red_blue = Gradient::new_linear(
        Point::ZERO,
        Point::new(10.0, 0.0),
        &[stop(0.0, Color::RED), stop(1.0, Color::BLUE)],
    )
    .unwrap();
    let red_green = Gradient::new_radial(
        Point::ZERO,
        10.0,
        &[stop(0.0, Color::RED), stop(1.0, Color::GREEN)],
    )
    .unwrap();
    let complex = Gradient::new_linear(
        Point::ZERO,
        Point::new(10.0, 0.0),
        &[
            stop(0.0, Color::RED),
            stop(0.5, Color::WHITE),
            stop(1.0, Color::BLUE),
        ],
    )
    .unwrap();

    let a = context.push_gradient(&red_blue).unwrap();
    assert_eq!((a.row, a.left, a.right), (0, 0, 2));
    assert_eq!(context.push_gradient(&red_blue), Some(a));
    let b = context.push_gradient(&red_green).unwrap();
    assert_eq!((b.row, b.left, b.right), (0, 2, 4));

    // Complex ramps get whole rows below the simple ones.
    let c = context.push_gradient(&complex).unwrap();
    assert_eq!((c.row, c.left, c.right), (1, 0, 512));
    assert_eq!(context.push_gradient(&complex), Some(c));

    context.flush(FlushType::EndOfFrame).unwrap();
    let record = context.backend().last_flush().unwrap();
    assert_eq!(record.simple_ramps.len(), 2);
    assert_eq!(record.simple_ramps[0].color0, [255, 0, 0, 255]);
    // Three stops make four spans.
    assert_eq!(record.gradient_spans.len(), 4);
    assert!(record.gradient_spans.iter().all(|span| span.y == 0));
    assert_eq!(record.complex_grad_rows_top, 1);
    assert_eq!(record.complex_grad_rows_height, 1);

    // The cache does not outlive the flush.
    begin(&mut context);
    let again = context.push_gradient(&red_green).unwrap();
    assert_eq!((again.row, again.left), (0, 0));
}

#[test]
fn full_simple_gradient_rows_flush_before_the_next_ramp() {
    let mut context = context();
    begin(&mut context);
    let limit = context.resource_limits().max_simple_gradients;
    let mut pushed = 0;
    while context.push_gradient(&simple_gradient(pushed)).is_some() {
        pushed += 1;
        assert!(pushed <= limit, "simple ramps never ran out");
    }
    assert_eq!(pushed, limit);

    Renderer::new(&mut context)
        .fill(
            Fill::NonZero,
            Affine::IDENTITY,
            &Paint::new(simple_gradient(limit)),
            &rect(0.0, 0.0, 10.0),
        )
        .unwrap();
    assert!(context.resource_limits().max_simple_gradients > limit);
    context.flush(FlushType::EndOfFrame).unwrap();

    let flushes = context.backend().flushes();
    assert_eq!(flushes.len(), 2);
    assert_eq!(flushes[0].flush_type, FlushType::Intermediate);
    assert_eq!(flushes[0].simple_ramps.len(), limit);
    assert!(flushes[0].path_data.is_empty());
    assert_eq!(flushes[1].simple_ramps.len(), 1);
    assert_eq!(flushes[1].path_data.len(), 1);
    // The retried draw got the first slot of the new flush.
    assert_eq!(flushes[1].path_data[0].paint_data.data[0], 1 << 10);
}

#[test]
fn full_complex_gradient_rows_flush_before_the_next_ramp() {
    let mut context = context();
    begin(&mut context);
    let limit = context.resource_limits().max_complex_gradients;
    let mut pushed = 0;
    while context.push_gradient(&complex_gradient(pushed)).is_some() {
        pushed += 1;
        assert!(pushed <= limit, "complex ramps never ran out");
    }
    assert_eq!(pushed, limit);

    Renderer::new(&mut context)
        .fill(
            Fill::NonZero,
            Affine::IDENTITY,
            &Paint::new(complex_gradient(limit)),
            &rect(0.0, 0.0, 10.0),
        )
        .unwrap();
    context.flush(FlushType::EndOfFrame).unwrap();

    let flushes = context.backend().flushes();
    assert_eq!(flushes.len(), 2);
    assert_eq!(flushes[0].flush_type, FlushType::Intermediate);
    assert_eq!(flushes[0].complex_grad_rows_height, limit);
    assert_eq!(flushes[0].gradient_spans.len(), limit * complex_ramp_span_count(3));
    assert!(flushes[0].path_data.is_empty());

    let record = &flushes[1];
    assert_eq!(record.complex_grad_rows_height, 1);
    assert_eq!(record.gradient_spans.len(), complex_ramp_span_count(3));
    let data = record.path_data[0].paint_data.data[0];
    assert_eq!(data >> 20, record.complex_grad_rows_top as u32);
    assert_eq!((data >> 10) & 0x3ff, 511);
}

#[test]
fn a_batch_that_overflows_the_gradient_texture_writes_no_ramps() {
    let mut context = context();
    begin(&mut context);
    let limit = context.resource_limits().max_simple_gradients;
    for i in 0..limit - 1 {
        assert!(context.push_gradient(&simple_gradient(i)).is_some());
    }
    let path = rect(0.0, 0.0, 10.0);
    let style = PathStyle::Fill(FillRule::NonZero);
    let draw = |i: usize| {
        let paint = Paint::new(simple_gradient(i));
        Draw::MidpointFanPath(PathDraw::midpoint_fan(&path, Affine::IDENTITY, &style, &paint, 0))
    };

    // Only the first of the two new ramps would fit.
    assert!(context.push_draw_batch(vec![draw(limit - 1), draw(limit)]).is_err());
    context.flush(FlushType::Intermediate).unwrap();
    let record = context.backend().last_flush().unwrap();
    assert_eq!(record.simple_ramps.len(), limit - 1);
    assert!(record.path_data.is_empty());

    assert!(context.push_draw_batch(vec![draw(limit - 1), draw(limit)]).is_ok());
    context.flush(FlushType::EndOfFrame).unwrap();
    let record = context.backend().last_flush().unwrap();
    assert_eq!(record.simple_ramps.len(), 2);
    assert_eq!(record.path_data.len(), 2);
    assert_eq!(record.path_data[0].paint_data.data[0], 1 << 10);
    assert_eq!(record.path_data[1].paint_data.data[0], 3 << 10 | 2);
}

#[test]
fn offset_two_stop_radial_gradients_use_a_complex_ramp() {
    let mut context = context();
    begin(&mut context);
    let gradient = Gradient::new_radial(
        Point::new(5.0, 6.0),
        10.0,
        &[stop(0.2, Color::RED), stop(1.0, Color::BLUE)],
    )
    .unwrap();
    assert!(!gradient.is_simple());
    assert_eq!(gradient.coeffs(), [5.0, 6.0, 10.0]);
    Renderer::new(&mut context)
        .fill(
            Fill::NonZero,
            Affine::IDENTITY,
            &Paint::new(gradient),
            &rect(0.0, 0.0, 10.0),
        )
        .unwrap();
    context.flush(FlushType::EndOfFrame).unwrap();

    let record = context.backend().last_flush().unwrap();
    assert!(record.simple_ramps.is_empty());
    assert_eq!(record.gradient_spans.len(), complex_ramp_span_count(2));
    assert_eq!(record.complex_grad_rows_height, 1);
    let path = &record.path_data[0];
    assert_eq!((path.params >> 1) & 7, PaintType::RadialGradient as u32);
    let data = path.paint_data.data;
    assert_eq!(data[0] >> 20, record.complex_grad_rows_top as u32);
    assert_eq!((data[0] >> 10) & 0x3ff, 511);
    assert_eq!(data[0] & 0x3ff, 0);
    assert_eq!(
        [data[1], data[2], data[3]].map(f32::from_bits),
        [5.0, 6.0, 10.0]
    );
}

#[test]
fn inset_two_stop_linear_gradients_use_a_simple_ramp() {
    let mut context = context();
    begin(&mut context);
    let gradient = Gradient::new_linear(
        Point::ZERO,
        Point::new(100.0, 0.0),
        &[stop(0.25, Color::RED), stop(0.75, Color::BLUE)],
    )
    .unwrap();
    assert!(gradient.is_simple());
    Renderer::new(&mut context)
        .fill(
            Fill::NonZero,
            Affine::IDENTITY,
            &Paint::new(gradient),
            &rect(0.0, 0.0, 10.0),
        )
        .unwrap();
    context.flush(FlushType::EndOfFrame).unwrap();

    let record = context.backend().last_flush().unwrap();
    assert_eq!(record.simple_ramps.len(), 1);
    assert_eq!(record.simple_ramps[0].color0, [255, 0, 0, 255]);
    assert!(record.gradient_spans.is_empty());
    let data = record.path_data[0].paint_data.data;
    assert_eq!(data[0], 1 << 10);
    // The ramp was tightened to x = 25..75: t = x / 50 - 0.5.
    let [a, b, c] = [data[1], data[2], data[3]].map(f32::from_bits);
    assert!((a - 0.02).abs() < 1e-6);
    assert_eq!(b, 0.0);
    assert!((c + 0.5).abs() < 1e-6);
}

#[test]
fn gradient_fill_encodes_its_ramp_location() {
    let mut context = context();
    begin(&mut context);
    let gradient = Gradient::new_linear(
        Point::ZERO,
        Point::new(10.0, 0.0),
        &[stop(0.0, Color::RED), stop(1.0, Color::BLUE)],
    )
    .unwrap();
    let paint = Paint::new(gradient);
    Renderer::new(&mut context)
        .fill(Fill::NonZero, Affine::IDENTITY, &paint, &rect(0.0, 0.0, 10.0))
        .unwrap();
    context.flush(FlushType::EndOfFrame).unwrap();
    let record = context.backend().last_flush().unwrap();
    let path = &record.path_data[0];
    assert_eq!((path.params >> 1) & 7, PaintType::LinearGradient as u32);
    // row 0, texels 0..2: (right - 1) << 10 | left.
    assert_eq!(path.paint_data.data[0], 1 << 10);
}

#[test]
fn spans_wrap_onto_the_next_row() {
    let mut context = context();
    begin(&mut context);
    let counters = ResourceCounters {
        path_count: 1,
        contour_count: 1,
        curve_count: 3,
        tess_vertex_count: 2056,
        ..Default::default()
    };
    assert!(context.reserve_path_data(&counters));
    context.push_path(
        &PathParams {
            patch_type: PatchType::MidpointFan,
            matrix: Affine::IDENTITY,
            stroke_radius: 0.0,
            fill_rule: FillRule::NonZero,
            paint_type: PaintType::SolidColor,
            clip_id: 0,
            blend_mode: PlsBlendMode::SrcOver,
            paint_data: PaintData::solid_color(Color::BLACK),
            tess_vertex_count: 2056,
            padding_vertex_count: 0,
        },
        None,
    );
    context.push_contour(Point::new(5.0, 5.0), true, 0);
    let pts = [Point::ZERO, Point::new(1.0, 0.0), Point::new(2.0, 0.0), Point::new(3.0, 0.0)];
    context.push_cubic(&pts, Vec2::new(1.0, 0.0), 0, 1023, 0, 1);
    context.push_cubic(&pts, Vec2::new(1.0, 0.0), 0, 1023, 0, 1);
    assert_eq!(context.tess_vertex_count(), 2046);
    context.push_cubic(&pts, Vec2::new(1.0, 0.0), 0, 10, 0, 1);
    assert_eq!(context.tess_vertex_count(), 2056);
    context.flush(FlushType::EndOfFrame).unwrap();

    let record = context.backend().last_flush().unwrap();
    let spans = &record.tess_spans;
    assert_eq!(spans.len(), 5);
    let width = TESS_TEXTURE_WIDTH as i32;
    assert_eq!((spans[2].y, spans[2].x0(), spans[2].x1()), (0.0, 2046, 2056));
    assert_eq!(
        (spans[3].y, spans[3].x0(), spans[3].x1()),
        (1.0, 2046 - width, 2056 - width)
    );
    assert_eq!(spans[3].contour_id_with_flags, spans[2].contour_id_with_flags);
    assert_eq!((spans[4].y, spans[4].x0(), spans[4].x1()), (1.0, 8, 9));
    assert_eq!(record.tess_data_height, 2);
}

#[test]
fn long_stroke_spans_cover_every_vertex() {
    let mut context = context();
    begin(&mut context);
    let mut renderer = Renderer::new(&mut context);
    // Move the next path's start well into the first row.
    for _ in 0..120 {
        renderer
            .fill(Fill::NonZero, Affine::IDENTITY, &black(), &rect(0.0, 0.0, 4.0))
            .unwrap();
    }
    let mut path = BezPath::new();
    path.move_to((0.0, 0.0));
    path.curve_to((100.0, 100.0), (0.0, 100.0), (100.0, 0.0));
    let stroke = Stroke::new(1e4).with_caps(Cap::Round);
    renderer
        .stroke(&stroke, Affine::scale(100.0), &black(), &path)
        .unwrap();
    context.flush(FlushType::EndOfFrame).unwrap();
    assert_eq!(context.backend().flushes().len(), 1);

    let record = context.backend().last_flush().unwrap();
    let width = TESS_TEXTURE_WIDTH as i32;
    // One curve covers a whole row and spills past both of its edges.
    assert!(record
        .tess_spans
        .iter()
        .any(|span| span.x0() < 0 && span.x1() > width));

    let mut covered: Vec<(i32, i32)> = record
        .tess_spans
        .iter()
        .map(|span| {
            let row = span.y as i32 * width;
            (row + span.x0().max(0), row + span.x1().min(width))
        })
        .filter(|(start, end)| start < end)
        .collect();
    covered.sort_unstable();
    let mut next = 0;
    for (start, end) in covered {
        assert_eq!(start, next, "vertices {next}..{start} are not covered");
        next = end;
    }
    let marker = record.tess_spans.last().unwrap();
    assert_eq!(next, marker.y as i32 * width + marker.x1());
    assert!(next > 2 * width);
}

#[test]
fn contiguous_patch_draws_merge() {
    let mut context = context();
    begin(&mut context);
    let mut renderer = Renderer::new(&mut context);
    renderer
        .fill(Fill::NonZero, Affine::IDENTITY, &black(), &rect(0.0, 0.0, 10.0))
        .unwrap();
    renderer
        .fill(Fill::EvenOdd, Affine::IDENTITY, &black(), &rect(20.0, 0.0, 10.0))
        .unwrap();
    let multiply = black().with_blend_mode(BlendMode::new(Mix::Multiply, Compose::SrcOver));
    renderer
        .fill(Fill::NonZero, Affine::IDENTITY, &multiply, &rect(40.0, 0.0, 10.0))
        .unwrap();
    context.flush(FlushType::EndOfFrame).unwrap();

    let record = context.backend().last_flush().unwrap();
    assert_eq!(record.path_data.len(), 3);
    assert_eq!(record.draw_list.len(), 1);
    let batch = &record.draw_list[0];
    assert_eq!((batch.base_element, batch.element_count), (0, 3));
    assert!(batch.shader_features.contains(ShaderFeatures::ENABLE_EVEN_ODD));
    assert!(batch.shader_features.contains(ShaderFeatures::ENABLE_ADVANCED_BLEND));
    assert!(!batch.shader_features.contains(ShaderFeatures::ENABLE_CLIPPING));
    assert_eq!(record.combined_shader_features, batch.shader_features);
}

#[test]
fn clips_are_rendered_before_the_draws_they_clip() {
    let mut context = context();
    begin(&mut context);
    let mut renderer = Renderer::new(&mut context);
    renderer.push_clip(Fill::NonZero, Affine::IDENTITY, &rect(0.0, 0.0, 50.0));
    renderer
        .fill(Fill::NonZero, Affine::IDENTITY, &black(), &rect(10.0, 10.0, 10.0))
        .unwrap();
    // The clip is already in the clip buffer; no second update.
    renderer
        .fill(Fill::NonZero, Affine::IDENTITY, &black(), &rect(20.0, 20.0, 10.0))
        .unwrap();
    renderer.push_clip(Fill::NonZero, Affine::IDENTITY, &rect(5.0, 5.0, 30.0));
    renderer
        .fill(Fill::NonZero, Affine::IDENTITY, &black(), &rect(10.0, 10.0, 10.0))
        .unwrap();
    renderer.pop_clip();
    renderer.pop_clip();
    renderer
        .fill(Fill::NonZero, Affine::IDENTITY, &black(), &rect(10.0, 10.0, 10.0))
        .unwrap();
    context.flush(FlushType::EndOfFrame).unwrap();

    let record = context.backend().last_flush().unwrap();
    let paint_type = |i: usize| (record.path_data[i].params >> 1) & 7;
    let clip_id = |i: usize| (record.path_data[i].params >> 4) & 0xffff;
    let clip_update = PaintType::ClipUpdate as u32;
    // clip 1, fill, fill, clip 2, nested clip 3, fill, fill
    assert_eq!(record.path_data.len(), 7);
    assert_eq!((paint_type(0), clip_id(0)), (clip_update, 1));
    assert_eq!(record.path_data[0].paint_data.data[0], 0);
    assert_eq!((paint_type(1), clip_id(1)), (PaintType::SolidColor as u32, 1));
    assert_eq!(clip_id(2), 1);
    assert_eq!((paint_type(3), clip_id(3)), (clip_update, 2));
    assert_eq!((paint_type(4), clip_id(4)), (clip_update, 3));
    assert_eq!(record.path_data[4].paint_data.data[0], 2);
    assert_eq!(clip_id(5), 3);
    assert_eq!(clip_id(6), 0);

    let features = record.combined_shader_features;
    assert!(features.contains(ShaderFeatures::ENABLE_CLIPPING));
    assert!(features.contains(ShaderFeatures::ENABLE_NESTED_CLIPPING));
}

#[test]
fn large_fills_use_interior_triangulation() {
    let mut context = context();
    begin(&mut context);
    Renderer::new(&mut context)
        .fill(Fill::NonZero, Affine::IDENTITY, &black(), &rect(0.0, 0.0, 1000.0))
        .unwrap();
    context.flush(FlushType::EndOfFrame).unwrap();

    let record = context.backend().last_flush().unwrap();
    let types: Vec<_> = record.draw_list.iter().map(|b| b.draw_type).collect();
    assert_eq!(
        types,
        [DrawType::OuterCurvePatches, DrawType::InteriorTriangulation]
    );
    assert_eq!(record.draw_list[0].element_count, 4);
    assert_eq!(record.draw_list[1].element_count, 6);
    assert_eq!(record.triangles.len(), 6);
    assert!(record.triangles.iter().all(|v| v.path_id() == 1 && v.weight() == 1));
}

#[test]
fn strokes_are_tessellated_with_caps_and_joins() {
    let mut context = context();
    begin(&mut context);
    let mut path = BezPath::new();
    path.move_to((0.0, 0.0));
    path.line_to((100.0, 0.0));
    path.line_to((100.0, 100.0));
    let stroke = pls_render::kurbo::Stroke::new(6.0);
    Renderer::new(&mut context)
        .stroke(&stroke, Affine::IDENTITY, &black(), &path)
        .unwrap();
    context.flush(FlushType::EndOfFrame).unwrap();

    let record = context.backend().last_flush().unwrap();
    assert_eq!(record.path_data[0].stroke_radius, 3.0);
    // Open contours flag the closed bit off.
    assert_eq!(record.contours[0].midpoint, [0.0, 0.0]);
    let caps = record
        .tess_spans
        .iter()
        .filter(|s| s.contour_id_with_flags & contour_flags::EMULATED_STROKE_CAP != 0)
        .count();
    assert_eq!(caps, 2);
    let last_vertex = record.tess_spans.last().unwrap().x1();
    assert_eq!((last_vertex - 1) % 8, 0);
}

#[test]
fn image_rects_carry_their_uniforms() {
    let mut context = context();
    begin(&mut context);
    let texture: Arc<dyn ImageTexture> = Arc::new(HeadlessTexture {
        width: 64,
        height: 32,
    });
    let mut renderer = Renderer::new(&mut context);
    renderer
        .draw_image(&texture, Affine::translate((5.0, 5.0)), 0.5, BlendMode::default())
        .unwrap();
    renderer
        .draw_image(&texture, Affine::IDENTITY, 1.0, BlendMode::default())
        .unwrap();
    context.flush(FlushType::EndOfFrame).unwrap();

    let record = context.backend().last_flush().unwrap();
    assert_eq!(record.draw_list.len(), 2);
    assert!(record
        .draw_list
        .iter()
        .all(|b| b.draw_type == DrawType::ImageRect && b.image_draw.is_some()));
    assert_eq!(record.draw_list[1].image_draw_data_offset, 1);
    assert_eq!(record.image_draw_uniforms.len(), 2);
    assert_eq!(record.image_draw_uniforms[0].opacity, 0.5);
    assert_eq!(record.image_draw_uniforms[0].matrix, [64.0, 0.0, 0.0, 32.0, 5.0, 5.0]);
}

#[test]
fn image_paints_merge_only_on_the_same_texture() {
    let mut context = context();
    begin(&mut context);
    let a: Arc<dyn ImageTexture> = Arc::new(HeadlessTexture {
        width: 8,
        height: 8,
    });
    let b: Arc<dyn ImageTexture> = Arc::new(HeadlessTexture {
        width: 8,
        height: 8,
    });
    let image = |texture: &Arc<dyn ImageTexture>| {
        Paint::new(Brush::Image {
            texture: texture.clone(),
            opacity: 1.0,
        })
    };
    let mut renderer = Renderer::new(&mut context);
    for (i, texture) in [&a, &a, &b].into_iter().enumerate() {
        let path = rect(i as f64 * 10.0, 0.0, 8.0);
        renderer
            .fill(Fill::NonZero, Affine::IDENTITY, &image(texture), &path)
            .unwrap();
    }
    context.flush(FlushType::EndOfFrame).unwrap();
    let record = context.backend().last_flush().unwrap();
    let counts: Vec<_> = record.draw_list.iter().map(|b| b.element_count).collect();
    assert_eq!(counts, [2, 1]);
}

#[test]
fn bindless_images_are_drawn_as_paths() {
    let backend = HeadlessBackend::new(PlatformFeatures {
        supports_bindless_textures: true,
        ..Default::default()
    });
    let mut context = RenderContext::new(backend);
    begin(&mut context);
    let texture: Arc<dyn ImageTexture> = Arc::new(HeadlessTexture {
        width: 16,
        height: 16,
    });
    Renderer::new(&mut context)
        .draw_image(&texture, Affine::IDENTITY, 1.0, BlendMode::default())
        .unwrap();
    context.flush(FlushType::EndOfFrame).unwrap();
    let record = context.backend().last_flush().unwrap();
    assert_eq!(record.draw_list[0].draw_type, DrawType::MidpointFanPatches);
    assert_eq!((record.path_data[0].params >> 1) & 7, PaintType::Image as u32);
    assert!(record.image_draw_uniforms.is_empty());
}

#[test]
fn intermediate_flushes_grow_the_exhausted_resource() {
    let mut context = context();
    begin(&mut context);
    let before = *context.resource_limits();
    let mut renderer = Renderer::new(&mut context);
    let mut drawn = 0;
    while renderer.context().backend().flushes().is_empty() {
        renderer
            .fill(Fill::NonZero, Affine::IDENTITY, &black(), &rect(0.0, 0.0, 4.0))
            .unwrap();
        drawn += 1;
        assert!(drawn < 100_000, "never ran out of room");
    }
    let after = *context.resource_limits();
    assert!(after.max_tessellation_spans >= 2 * before.max_tessellation_spans);
    // The draw that triggered the flush went into the next one.
    context.flush(FlushType::EndOfFrame).unwrap();
    let flushes = context.backend().flushes();
    assert_eq!(flushes.len(), 2);
    assert_eq!(flushes[0].flush_type, FlushType::Intermediate);
    assert_eq!(flushes[0].load_action, LoadAction::Clear);
    assert_eq!(flushes[1].load_action, LoadAction::PreserveRenderTarget);
    assert_eq!(flushes[1].path_data.len(), 1);
    assert_eq!(flushes[0].path_data.len() + 1, drawn);
}

#[test]
fn unchanged_flush_uniforms_are_not_reuploaded() {
    let mut context = context();
    for (width, expected_uploads) in [(800, 1), (800, 1), (640, 2)] {
        context
            .begin_frame(FrameDescriptor::new(width, 600))
            .unwrap();
        Renderer::new(&mut context)
            .fill(Fill::NonZero, Affine::IDENTITY, &black(), &rect(0.0, 0.0, 10.0))
            .unwrap();
        context.flush(FlushType::EndOfFrame).unwrap();
        let record = context.backend().last_flush().unwrap();
        assert_eq!(record.flush_uniform_uploads, expected_uploads);
    }
}

#[test]
fn resources_shrink_only_when_a_third_is_freed() {
    let mut context = context();
    // Nothing grew: shrinking reallocates nothing.
    begin(&mut context);
    context.flush(FlushType::EndOfFrame).unwrap();
    let allocations = context.backend().ring_allocations();
    context.shrink_gpu_resources_to_fit();
    assert_eq!(context.backend().ring_allocations(), allocations);

    // Grow the tessellation texture in place with a large reservation.
    begin(&mut context);
    let counters = ResourceCounters {
        tess_vertex_count: 300_000,
        ..Default::default()
    };
    assert!(context.reserve_path_data(&counters));
    assert!(context.resource_limits().max_tessellation_vertices >= 600_000);
    context.flush(FlushType::EndOfFrame).unwrap();

    // The frame never used it, so it shrinks back to its floor.
    context.shrink_gpu_resources_to_fit();
    assert_eq!(
        context.resource_limits().max_tessellation_vertices,
        MIN_TESSELLATION_VERTICES
    );
    assert_eq!(
        context.backend().tess_texture_height() as usize,
        MIN_TESSELLATION_VERTICES / TESS_TEXTURE_WIDTH as usize
    );
}

#[test]
fn draws_that_never_fit_are_dropped() {
    let mut context = context();
    begin(&mut context);
    // More contours than a flush can address.
    let mut path = BezPath::new();
    for i in 0..70_000 {
        let x = (i % 100) as f64;
        path.move_to((x, 0.0));
        path.line_to((x + 1.0, 1.0));
    }
    let mut renderer = Renderer::new(&mut context);
    renderer
        .fill(Fill::NonZero, Affine::IDENTITY, &black(), &path)
        .unwrap();
    // The context is still usable.
    renderer
        .fill(Fill::NonZero, Affine::IDENTITY, &black(), &rect(0.0, 0.0, 10.0))
        .unwrap();
    context.flush(FlushType::EndOfFrame).unwrap();
    let flushes = context.backend().flushes();
    assert_eq!(flushes.len(), 2);
    assert!(flushes[0].path_data.is_empty());
    assert_eq!(flushes[1].path_data.len(), 1);
}

#[test]
fn disabled_fills_and_strokes_are_skipped() {
    let mut context = context();
    let mut frame = FrameDescriptor::new(100, 100);
    frame.fills_disabled = true;
    frame.strokes_disabled = true;
    context.begin_frame(frame).unwrap();
    let mut renderer = Renderer::new(&mut context);
    let path = rect(0.0, 0.0, 10.0);
    renderer
        .fill(Fill::NonZero, Affine::IDENTITY, &black(), &path)
        .unwrap();
    renderer
        .stroke(
            &pls_render::kurbo::Stroke::new(2.0),
            Affine::IDENTITY,
            &black(),
            &path,
        )
        .unwrap();
    context.flush(FlushType::EndOfFrame).unwrap();
    let record = context.backend().last_flush().unwrap();
    assert!(record.path_data.is_empty());
    assert!(record.draw_list.is_empty());
    assert!(record.tess_spans.is_empty());
}
