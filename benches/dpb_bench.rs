//! DPB 与 slice 头解析性能基准测试.
//!
//! 覆盖滑动窗口, 默认参考列表构造, 以及完整的 Annex B 解码循环.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use vde::codec::h264::{DecoderConfig, Dpb, H264Decoder, SlotId, SoftwareEngine};
use vde::core::BitWriter;

/// 当前图像写入位置 0 后按参考帧滑动
fn push_reference(dpb: &mut Dpb, frame_num: u32, poc: i32, max: usize) -> Option<SlotId> {
    let current = dpb.current_mut();
    current.frame_num = frame_num;
    current.pic_order_cnt = poc;
    current.empty = false;
    dpb.slide(max, 0).unwrap()
}

/// 填满 16 个参考帧, POC 交错排列
fn make_full_dpb() -> Dpb {
    let mut dpb = Dpb::new();
    for frame_num in 0..16u32 {
        let poc = if frame_num % 2 == 0 {
            frame_num as i32 * 4
        } else {
            64 - frame_num as i32 * 2
        };
        push_reference(&mut dpb, frame_num, poc, 16);
    }
    dpb.current_mut().pic_order_cnt = 33;
    dpb
}

fn push_nal(stream: &mut Vec<u8>, header: u8, rbsp: Vec<u8>) {
    stream.extend_from_slice(&[0x00, 0x00, 0x00, 0x01, header]);
    let mut zeros = 0usize;
    for byte in rbsp {
        if zeros >= 2 && byte <= 0x03 {
            stream.push(0x03);
            zeros = 0;
        }
        zeros = if byte == 0x00 { zeros + 1 } else { 0 };
        stream.push(byte);
    }
}

/// Baseline SPS/PPS + IDR + P 帧链, frame_num 8 位, POC lsb 8 位
fn make_stream(frames: u32) -> Vec<u8> {
    let mut stream = Vec::new();

    let mut bw = BitWriter::new();
    bw.write_bits(66, 8);
    bw.write_bits(0, 8);
    bw.write_bits(40, 8);
    bw.write_ue(0);
    bw.write_ue(4); // log2_max_frame_num = 8
    bw.write_ue(0);
    bw.write_ue(4); // log2_max_poc_lsb = 8
    bw.write_ue(4); // max_num_ref_frames
    bw.write_flag(false);
    bw.write_ue(119); // 1920
    bw.write_ue(67); // 1088
    bw.write_flag(true);
    bw.write_flag(true);
    bw.write_flag(false);
    bw.write_flag(false);
    bw.write_trailing_bits();
    push_nal(&mut stream, 0x67, bw.finish());

    let mut bw = BitWriter::new();
    bw.write_ue(0);
    bw.write_ue(0);
    bw.write_flag(false);
    bw.write_flag(false);
    bw.write_ue(0);
    bw.write_ue(2); // 3 个 L0 活动参考
    bw.write_ue(0);
    bw.write_flag(false);
    bw.write_bits(0, 2);
    bw.write_se(0);
    bw.write_se(0);
    bw.write_se(0);
    bw.write_flag(false);
    bw.write_flag(false);
    bw.write_flag(false);
    bw.write_trailing_bits();
    push_nal(&mut stream, 0x68, bw.finish());

    for frame_num in 0..frames {
        let idr = frame_num == 0;
        let mut bw = BitWriter::new();
        bw.write_ue(0);
        bw.write_ue(if idr { 7 } else { 5 });
        bw.write_ue(0);
        bw.write_bits(frame_num, 8);
        if idr {
            bw.write_ue(0);
        }
        bw.write_bits((frame_num * 2) % 256, 8);
        if idr {
            bw.write_flag(false);
            bw.write_flag(false);
        } else {
            // 前两个 P 帧参考不足 3 个, 显式覆盖为 1
            let count = frame_num.min(3);
            bw.write_flag(true);
            bw.write_ue(count - 1);
            bw.write_flag(false);
            bw.write_flag(false);
        }
        bw.write_se(0);
        bw.write_trailing_bits();
        push_nal(&mut stream, if idr { 0x65 } else { 0x41 }, bw.finish());
    }
    stream
}

fn bench_sliding_window(c: &mut Criterion) {
    c.bench_function("dpb_sliding_window_64", |b| {
        b.iter(|| {
            let mut dpb = Dpb::new();
            for frame_num in 0..64u32 {
                black_box(push_reference(&mut dpb, frame_num, frame_num as i32 * 2, 16));
            }
            dpb
        });
    });
}

fn bench_default_lists(c: &mut Criterion) {
    let dpb = make_full_dpb();
    c.bench_function("dpb_build_p_list0", |b| {
        b.iter(|| black_box(dpb.build_p_list0(black_box(0))));
    });
    c.bench_function("dpb_build_b_lists", |b| {
        b.iter(|| {
            let l0 = dpb.build_b_list0();
            let l1 = dpb.build_b_list1();
            black_box((l0, l1))
        });
    });
}

fn bench_decode_stream(c: &mut Criterion) {
    let stream = make_stream(120);
    c.bench_function("decode_annex_b_120_frames", |b| {
        b.iter(|| {
            let mut decoder = H264Decoder::new(DecoderConfig::default());
            let mut engine = SoftwareEngine::new();
            let frames = decoder
                .decode_annex_b(black_box(stream.clone()), &mut engine)
                .unwrap();
            black_box(frames.len())
        });
    });
}

criterion_group!(
    benches,
    bench_sliding_window,
    bench_default_lists,
    bench_decode_stream
);
criterion_main!(benches);
