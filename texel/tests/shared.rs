use std::thread;

use raster_texel::SharedBuffer;

#[test]
fn clones_read_identical_bytes() {
    let buffer = SharedBuffer::from(&[3u8, 1, 4, 1, 5][..]);
    let alias = buffer.clone();

    assert_eq!(buffer.as_bytes(), alias.as_bytes());
    assert_eq!(buffer, alias);
    assert_eq!(buffer.ref_count(), 2);
}

#[test]
fn ref_count_tracks_live_handles() {
    let buffer = SharedBuffer::with_len(8);
    let handles: Vec<_> = (0..5).map(|_| buffer.clone()).collect();
    assert_eq!(buffer.ref_count(), 6);

    drop(handles);
    assert_eq!(buffer.ref_count(), 1);
}

#[test]
fn concurrent_clone_and_release() {
    let buffer = SharedBuffer::from(vec![0xaa; 64]);

    thread::scope(|scope| {
        for _ in 0..8 {
            let local = buffer.clone();
            scope.spawn(move || {
                for _ in 0..1000 {
                    let copy = local.clone();
                    assert_eq!(copy.at(63), Some(0xaa));
                }
            });
        }
    });

    assert_eq!(buffer.ref_count(), 1);
}

#[test]
fn concurrent_writers_detach_independently() {
    let buffer = SharedBuffer::from(vec![0u8; 16]);

    thread::scope(|scope| {
        for value in 1..=4u8 {
            let mut local = buffer.clone();
            scope.spawn(move || {
                local.fill(value);
                assert!(local.as_bytes().iter().all(|&b| b == value));
            });
        }
    });

    assert!(buffer.as_bytes().iter().all(|&b| b == 0));
    assert_eq!(buffer.ref_count(), 1);
}
