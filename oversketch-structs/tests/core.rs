use oversketch_structs::core::{Axis, BlockIndex, MatrixHandle, Phase, TaskLabel};
use oversketch_utils::{dejsonify, jsonify};

#[test]
fn test_block_counts() {
    let handle = MatrixHandle::new("A", (2000, 10000), (1000, 10000));
    assert_eq!(handle.num_blocks(Axis::Rows), 2);
    assert_eq!(handle.num_blocks(Axis::Cols), 1);
    assert_eq!(handle.block_indices(Axis::Rows), vec![0, 1]);
    assert_eq!(
        handle.block_idxs(),
        vec![BlockIndex::new(0, 0), BlockIndex::new(1, 0)]
    );
}

#[test]
fn test_edge_block_shape() {
    let handle = MatrixHandle::new("X", (10, 7), (4, 3));
    assert_eq!(handle.num_blocks(Axis::Rows), 3);
    assert_eq!(handle.num_blocks(Axis::Cols), 3);
    assert_eq!(handle.block_shape(BlockIndex::new(0, 0)), (4, 3));
    assert_eq!(handle.block_shape(BlockIndex::new(2, 2)), (2, 1));
    assert!(handle.contains(BlockIndex::new(2, 2)));
    assert!(!handle.contains(BlockIndex::new(3, 0)));
}

#[test]
fn test_handle_json() {
    let handle = MatrixHandle::new("AxB_2000_3000", (2000, 3000), (1000, 1000));
    assert_eq!(
        jsonify(&handle),
        r#"{"name":"AxB_2000_3000","shape":[2000,3000],"shard_shape":[1000,1000]}"#
    );
    assert_eq!(dejsonify::<MatrixHandle>(&jsonify(&handle)).unwrap(), handle);
}

#[test]
fn test_task_label_display() {
    let label = TaskLabel {
        phase: Phase::Computing,
        index: 12,
    };
    assert_eq!(label.to_string(), "computing#12");
    assert_eq!(BlockIndex::new(1, 2).to_string(), "(1, 2)");
}
