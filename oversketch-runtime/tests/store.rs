use ndarray::{array, Array2};
use oversketch_protocol::{BlockStore, StoreError};
use oversketch_runtime::{gather_matrix, shard_matrix, InMemoryBlockStore};
use oversketch_structs::core::{BlockIndex, MatrixHandle};

#[tokio::test]
async fn test_put_and_get_block() {
    let store = InMemoryBlockStore::new();
    let handle = store.create_matrix("X", (4, 4), (2, 2)).await.unwrap();
    let block = array![[1.0, 2.0], [3.0, 4.0]];
    store
        .put_block(&handle, BlockIndex::new(1, 0), block.clone())
        .await
        .unwrap();
    assert_eq!(
        store.get_block(&handle, BlockIndex::new(1, 0)).await.unwrap(),
        block
    );
    assert!(store.contains_block("X", BlockIndex::new(1, 0)).await);
    assert_eq!(store.num_stored_blocks("X").await, 1);
}

#[tokio::test]
async fn test_missing_block_is_not_found() {
    let store = InMemoryBlockStore::new();
    let handle = store.create_matrix("X", (4, 4), (2, 2)).await.unwrap();
    let err = store
        .get_block(&handle, BlockIndex::new(0, 1))
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    let other = MatrixHandle::new("Y", (4, 4), (2, 2));
    assert_eq!(
        store.get_block(&other, BlockIndex::new(0, 0)).await,
        Err(StoreError::MatrixNotFound("Y".to_string()))
    );
}

#[tokio::test]
async fn test_put_rejects_bad_blocks() {
    let store = InMemoryBlockStore::new();
    let handle = store.create_matrix("X", (5, 4), (2, 2)).await.unwrap();
    let err = store
        .put_block(&handle, BlockIndex::new(0, 0), Array2::zeros((2, 3)))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::ShapeMismatch { .. }));

    let err = store
        .put_block(&handle, BlockIndex::new(3, 0), Array2::zeros((2, 2)))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Write { .. }));

    // trailing row shard holds a single row
    store
        .put_block(&handle, BlockIndex::new(2, 1), Array2::zeros((1, 2)))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_unreadable_matrix() {
    let store = InMemoryBlockStore::new();
    let handle = store.create_matrix("X", (2, 2), (2, 2)).await.unwrap();
    store
        .put_block(&handle, BlockIndex::new(0, 0), Array2::ones((2, 2)))
        .await
        .unwrap();
    store.set_unreadable("X").await;
    let err = store
        .get_block(&handle, BlockIndex::new(0, 0))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Read { .. }));
    assert!(!err.is_not_found());

    store.set_readable("X").await;
    assert!(store.get_block(&handle, BlockIndex::new(0, 0)).await.is_ok());
}

#[tokio::test]
async fn test_recreate_clears_blocks_and_clones_share() {
    let store = InMemoryBlockStore::new();
    let shared = store.clone();
    let handle = store.create_matrix("X", (2, 2), (1, 1)).await.unwrap();
    store
        .put_block(&handle, BlockIndex::new(0, 0), array![[1.0]])
        .await
        .unwrap();
    assert!(shared.contains_block("X", BlockIndex::new(0, 0)).await);
    assert_eq!(shared.handle("X").await, Some(handle.clone()));

    shared.create_matrix("X", (2, 2), (1, 1)).await.unwrap();
    assert_eq!(store.num_stored_blocks("X").await, 0);

    store
        .put_block(&handle, BlockIndex::new(1, 1), array![[2.0]])
        .await
        .unwrap();
    assert_eq!(
        store.remove_block("X", BlockIndex::new(1, 1)).await,
        Some(array![[2.0]])
    );
    assert_eq!(store.remove_block("X", BlockIndex::new(1, 1)).await, None);
}

#[tokio::test]
async fn test_shard_and_gather() {
    let store = InMemoryBlockStore::new();
    let matrix = Array2::from_shape_fn((5, 7), |(i, j)| (i * 7 + j) as f64);
    let handle = shard_matrix(&store, "M", &matrix, (2, 3)).await.unwrap();
    assert_eq!(handle.shape, (5, 7));
    assert_eq!(store.num_stored_blocks("M").await, 9);
    assert_eq!(
        store.get_block(&handle, BlockIndex::new(2, 2)).await.unwrap(),
        array![[34.0]]
    );
    assert_eq!(gather_matrix(&store, &handle).await.unwrap(), matrix);

    store.remove_block("M", BlockIndex::new(1, 1)).await;
    assert!(gather_matrix(&store, &handle).await.is_err());
    assert!(shard_matrix(&store, "Z", &matrix, (0, 3)).await.is_err());
}
