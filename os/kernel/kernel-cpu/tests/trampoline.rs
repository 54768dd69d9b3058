//! Structural checks on the AP trampoline image.
//!
//! Only an emulator can *run* the image; what the host can pin down is the
//! part the BSP relies on: the blob's size, the patch-slot offsets and
//! placeholders, and the embedded GDT.

use kernel_cpu::smp::{
    HANDOFF32_PLACEHOLDER, HANDOFF64_PLACEHOLDER, SmpError, handoff32_offset, handoff64_offset,
    patch_handoff, trampoline_image,
};

#[test]
fn image_fits_one_page() {
    let image = trampoline_image();
    assert!(image.len() <= 4096, "SIPI target must be a single page");
    assert!(image.len() > 0x80, "suspiciously small image");
}

#[test]
fn first_instruction_masks_interrupts() {
    // 0xFA = cli
    assert_eq!(trampoline_image()[0], 0xFA);
}

#[test]
fn patch_slots_are_inside_the_image_and_hold_placeholders() {
    let image = trampoline_image();
    let off32 = handoff32_offset();
    let off64 = handoff64_offset();

    assert!(off32 + 4 <= image.len());
    assert!(off64 + 8 <= image.len());

    assert_eq!(
        image[off32..off32 + 4],
        HANDOFF32_PLACEHOLDER.to_le_bytes()
    );
    assert_eq!(
        image[off64..off64 + 8],
        HANDOFF64_PLACEHOLDER.to_le_bytes()
    );
}

#[test]
fn patching_writes_the_handoff_address_into_both_slots() {
    let mut copy = trampoline_image().to_vec();
    patch_handoff(&mut copy, 0x0007_C000).unwrap();

    let off32 = handoff32_offset();
    let off64 = handoff64_offset();

    let slot32 = u32::from_le_bytes(copy[off32..off32 + 4].try_into().unwrap());
    let slot64 = u64::from_le_bytes(copy[off64..off64 + 8].try_into().unwrap());
    assert_eq!(slot32, 0x0007_C000);
    assert_eq!(slot64, 0x0007_C000);

    // Outside the slots the copy is untouched.
    let original = trampoline_image();
    for (i, (a, b)) in original.iter().zip(copy.iter()).enumerate() {
        let in32 = (off32..off32 + 4).contains(&i);
        let in64 = (off64..off64 + 8).contains(&i);
        if !in32 && !in64 {
            assert_eq!(a, b, "byte {i} changed");
        }
    }
}

#[test]
fn patching_rejects_buffers_that_are_not_fresh_copies() {
    let image = trampoline_image();

    let mut wrong_size = image.to_vec();
    wrong_size.pop();
    assert_eq!(
        patch_handoff(&mut wrong_size, 0x8000),
        Err(SmpError::ImageSize {
            expected: image.len(),
            got: image.len() - 1
        })
    );

    let mut zeroes = vec![0u8; image.len()];
    assert_eq!(
        patch_handoff(&mut zeroes, 0x8000),
        Err(SmpError::PlaceholderMismatch {
            offset: handoff32_offset()
        })
    );

    // Patching twice fails: the placeholders are gone after the first pass.
    let mut copy = image.to_vec();
    patch_handoff(&mut copy, 0x8000).unwrap();
    assert!(matches!(
        patch_handoff(&mut copy, 0x9000),
        Err(SmpError::PlaceholderMismatch { .. })
    ));
}

#[test]
fn patching_rejects_handoff_blocks_above_4g() {
    let mut copy = trampoline_image().to_vec();
    assert_eq!(
        patch_handoff(&mut copy, 1 << 32),
        Err(SmpError::HandoffNotAddressable(1 << 32))
    );
}

#[test]
fn embedded_gdt_carries_the_four_prescribed_descriptors() {
    let image = trampoline_image();

    let code32: [u8; 8] = 0x00CF_9A00_0000_FFFFu64.to_le_bytes();
    let data: [u8; 8] = 0x00CF_9200_0000_FFFFu64.to_le_bytes();
    let code64: [u8; 8] = 0x0020_9A00_0000_0000u64.to_le_bytes();

    let find = |needle: &[u8; 8]| {
        image
            .windows(8)
            .position(|w| w == needle)
            .unwrap_or_else(|| panic!("descriptor {needle:02x?} not found"))
    };

    let at32 = find(&code32);
    let at_data = find(&data);
    let at64 = find(&code64);

    // null, 0x08 code32, 0x10 data, 0x18 code64 — contiguous and in order
    assert_eq!(at_data, at32 + 8);
    assert_eq!(at64, at32 + 16);
    assert_eq!(image[at32 - 8..at32], [0u8; 8], "null descriptor first");
}
