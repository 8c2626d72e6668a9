mod common;

use buffercomm::{Communicator, Error, Op, Payload};
use common::{config, run};
use ndarray::{arr2, Array2, ArrayD, IxDyn};

#[test]
fn buffer_payload_round_trips() {
    let original = Array2::<f32>::from_shape_fn((3, 5), |(i, j)| i as f32 - j as f32 * 0.5).into_dyn();
    let expected = Payload::from(original.clone());
    let results = run(2, config(), move |comm| {
        if comm.rank() == 0 {
            comm.send(&Payload::from(original.clone()), 1, 21).unwrap();
            None
        } else {
            Some(comm.recv(0, 21).unwrap())
        }
    });
    assert_eq!(results[1], Some(expected));
}

#[test]
fn generic_payload_round_trips() {
    let results = run(2, config(), |comm| {
        if comm.rank() == 1 {
            let value = Payload::object(&vec![("x", 1.5), ("y", -2.0)]).unwrap();
            comm.send(&value, 0, 3).unwrap();
            None
        } else {
            Some(comm.recv(1, 3).unwrap().to_object::<Vec<(String, f64)>>().unwrap())
        }
    });
    assert_eq!(
        results[0],
        Some(vec![("x".to_string(), 1.5), ("y".to_string(), -2.0)])
    );
}

#[test]
fn ring_exchange_of_arrays() {
    let size = 4;
    let results = run(size, config(), move |comm| {
        let rank = comm.rank();
        let local = ArrayD::from_elem(IxDyn(&[2, rank + 1]), rank as i32);
        comm.send(&local.into(), (rank + 1) % size, 0).unwrap();
        comm.recv((rank + size - 1) % size, 0).unwrap()
    });
    for (rank, result) in results.into_iter().enumerate() {
        let left = (rank + size - 1) % size;
        assert_eq!(result, Payload::from(ArrayD::from_elem(IxDyn(&[2, left + 1]), left as i32)));
    }
}

#[test]
fn tags_keep_transfers_apart() {
    let results = run(2, config(), |comm| {
        if comm.rank() == 0 {
            comm.send(&Payload::from(arr2(&[[1i64, 2], [3, 4]]).into_dyn()), 1, 1).unwrap();
            comm.send(&Payload::object(&"second").unwrap(), 1, 2).unwrap();
            None
        } else {
            let second = comm.recv(0, 2).unwrap();
            let first = comm.recv(0, 1).unwrap();
            Some((first, second))
        }
    });
    let (first, second) = results[1].clone().unwrap();
    assert_eq!(first, Payload::from(arr2(&[[1i64, 2], [3, 4]]).into_dyn()));
    assert_eq!(second.to_object::<String>().unwrap(), "second");
}

#[test]
fn oversized_transfer_fails_on_both_ends() {
    let config = config().with_max_message_bytes(64);
    let results = run(2, config, |comm| {
        if comm.rank() == 0 {
            comm.send(&Payload::object(&"z".repeat(200)).unwrap(), 1, 9)
                .map(|_| None)
        } else {
            comm.recv(0, 9).map(Some)
        }
    });
    assert!(matches!(
        results[0],
        Err(Error::PayloadTooLarge { op: Op::Send, limit: 64, .. })
    ));
    assert!(matches!(
        results[1],
        Err(Error::PayloadTooLarge { op: Op::Recv, limit: 64, .. })
    ));
}

#[test]
fn arrays_are_not_bound_by_the_generic_limit() {
    let config = config().with_max_message_bytes(64);
    let results = run(2, config, |comm| {
        let array = ArrayD::<f64>::ones(IxDyn(&[32, 32]));
        if comm.rank() == 0 {
            comm.send(&array.into(), 1, 0).unwrap();
            true
        } else {
            comm.recv(0, 0).unwrap() == Payload::from(array)
        }
    });
    assert!(results[1]);
}
