mod common;

use buffercomm::{message, Array, Communicator, Error, Payload};
use common::{config, run};
use ndarray::{arr1, arr2, Array3, ArrayD, Axis, IxDyn};

fn iota(shape: &[usize], start: i64) -> ArrayD<i64> {
    let len = shape.iter().product::<usize>() as i64;
    ArrayD::from_shape_vec(IxDyn(shape), (start..start + len).collect()).unwrap()
}

// ============================================================================
// broadcast
// ============================================================================

#[test]
fn broadcast_array_reaches_every_rank() {
    let original = Array3::<f64>::from_shape_fn((2, 3, 4), |(i, j, k)| (i * 100 + j * 10 + k) as f64).into_dyn();
    let expected = Payload::from(original.clone());
    let results = run(4, config(), move |comm| {
        let data = (comm.rank() == 1).then(|| Payload::from(original.clone()));
        comm.broadcast(data, 1).unwrap()
    });
    for result in results {
        assert_eq!(result, expected);
    }
}

#[test]
fn broadcast_value_takes_the_generic_path() {
    let results = run(3, config(), |comm| {
        let data = (comm.rank() == 0).then(|| Payload::object(&("mesh", vec![1, 2, 3])).unwrap());
        comm.broadcast(data, 0).unwrap().to_object::<(String, Vec<i32>)>().unwrap()
    });
    for result in results {
        assert_eq!(result, ("mesh".to_string(), vec![1, 2, 3]));
    }
}

#[test]
fn broadcast_non_contiguous_array_keeps_its_values() {
    let transposed = Array::from(arr2(&[[1i32, 2, 3], [4, 5, 6]]).into_dyn()).reversed_axes();
    let expected = Payload::Array(transposed.clone());
    let results = run(2, config(), move |comm| {
        let data = (comm.rank() == 0).then(|| Payload::Array(transposed.clone()));
        comm.broadcast(data, 0).unwrap()
    });
    for result in results {
        assert_eq!(result, expected);
    }
}

#[test]
fn broadcast_of_an_empty_array() {
    let results = run(3, config(), |comm| {
        let data = (comm.rank() == 2).then(|| Payload::from(ArrayD::<f32>::zeros(IxDyn(&[0, 5]))));
        comm.broadcast(data, 2).unwrap()
    });
    for result in results {
        assert_eq!(result.as_array().unwrap().shape(), &[0, 5]);
    }
}

// ============================================================================
// gather
// ============================================================================

#[test]
fn gather_equal_shapes_in_rank_order() {
    let results = run(4, config(), |comm| {
        let local = iota(&[2, 2], 10 * comm.rank() as i64);
        comm.gather(local.into(), 0).unwrap()
    });
    let gathered = results[0].as_ref().unwrap();
    assert_eq!(gathered.len(), 4);
    for (rank, item) in gathered.iter().enumerate() {
        assert_eq!(item, &Payload::from(iota(&[2, 2], 10 * rank as i64)));
    }
    assert!(results[1..].iter().all(Option::is_none));
}

#[test]
fn gather_shapes_varying_along_axis_zero() {
    let shapes = [[2, 3], [4, 3], [1, 3]];
    let results = run(3, config(), move |comm| {
        let rank = comm.rank();
        comm.gather(iota(&shapes[rank], 100 * rank as i64).into(), 2).unwrap()
    });
    let gathered = results[2].as_ref().unwrap();
    for (rank, item) in gathered.iter().enumerate() {
        assert_eq!(item, &Payload::from(iota(&shapes[rank], 100 * rank as i64)));
    }
    assert!(results[0].is_none() && results[1].is_none());
}

#[test]
fn gather_shapes_varying_along_an_inner_axis() {
    let results = run(3, config(), |comm| {
        let rank = comm.rank();
        let local = ArrayD::from_elem(IxDyn(&[2, rank + 1, 2]), rank as f32);
        comm.gather(local.into(), 0).unwrap()
    });
    let gathered = results[0].as_ref().unwrap();
    for (rank, item) in gathered.iter().enumerate() {
        let array = item.typed::<f32>().unwrap();
        assert_eq!(array.shape(), &[2, rank + 1, 2]);
        assert!(array.iter().all(|&x| x == rank as f32));
    }
}

#[test]
fn gather_with_empty_contributions() {
    let results = run(3, config(), |comm| {
        let rows = if comm.rank() == 1 { 2 } else { 0 };
        comm.gather(iota(&[rows, 3], 0).into(), 0).unwrap()
    });
    let gathered = results[0].as_ref().unwrap();
    assert_eq!(gathered[0].as_array().unwrap().shape(), &[0, 3]);
    assert_eq!(gathered[1], Payload::from(iota(&[2, 3], 0)));
    assert_eq!(gathered[2].as_array().unwrap().shape(), &[0, 3]);
}

#[test]
fn gather_shapes_differing_in_two_axes_fail_everywhere() {
    let results = run(3, config(), |comm| {
        let n = comm.rank() + 1;
        comm.gather(iota(&[n, n], 0).into(), 0)
    });
    for result in results {
        assert_eq!(
            result,
            Err(Error::ShapeMismatch {
                shapes: vec![vec![1, 1], vec![2, 2], vec![3, 3]]
            })
        );
    }
}

#[test]
fn gather_differing_dimension_counts_fail_everywhere() {
    let results = run(2, config(), |comm| {
        let shape: &[usize] = if comm.rank() == 0 { &[4] } else { &[2, 2] };
        comm.gather(iota(shape, 0).into(), 1)
    });
    for result in results {
        assert!(matches!(result, Err(Error::ShapeMismatch { .. })));
    }
}

#[test]
fn one_generic_payload_moves_the_whole_gather_to_the_generic_path() {
    let results = run(3, config(), |comm| {
        let local = match comm.rank() {
            1 => Payload::object(&"not an array").unwrap(),
            r => Payload::from(iota(&[2, r + 1], 0)),
        };
        comm.gather(local, 0).unwrap()
    });
    let gathered = results[0].as_ref().unwrap();
    assert_eq!(gathered[0], Payload::from(iota(&[2, 1], 0)));
    assert_eq!(gathered[1].to_object::<String>().unwrap(), "not an array");
    assert_eq!(gathered[2], Payload::from(iota(&[2, 3], 0)));
}

#[test]
fn mixed_element_types_are_gathered_as_values() {
    let results = run(2, config(), |comm| {
        let local = if comm.rank() == 0 {
            Payload::from(arr1(&[1i32, 2]).into_dyn())
        } else {
            Payload::from(arr1(&[0.5f64]).into_dyn())
        };
        comm.gather(local, 0).unwrap()
    });
    let gathered = results[0].as_ref().unwrap();
    assert_eq!(gathered[0].typed::<i32>().unwrap(), &arr1(&[1, 2]).into_dyn());
    assert_eq!(gathered[1].typed::<f64>().unwrap(), &arr1(&[0.5]).into_dyn());
}

// ============================================================================
// scatter
// ============================================================================

#[test]
fn scatter_two_rows_per_rank() {
    let size = 3;
    let original = iota(&[2 * size, 4], 0);
    let source = original.clone();
    let results = run(size, config(), move |comm| {
        let data = (comm.rank() == 0).then(|| Payload::from(source.clone()));
        comm.scatter(data, 0).unwrap()
    });
    let parts: Vec<_> = results
        .iter()
        .map(|p| p.typed::<i64>().unwrap().view())
        .collect();
    for part in &parts {
        assert_eq!(part.shape(), &[2, 4]);
    }
    assert_eq!(ndarray::concatenate(Axis(0), &parts).unwrap(), original);
}

#[test]
fn scatter_one_row_per_rank_drops_the_leading_axis() {
    let results = run(4, config(), |comm| {
        let data = (comm.rank() == 3).then(|| Payload::from(iota(&[4, 2, 2], 0)));
        comm.scatter(data, 3).unwrap()
    });
    for (rank, result) in results.iter().enumerate() {
        assert_eq!(result, &Payload::from(iota(&[2, 2], 4 * rank as i64)));
    }
}

#[test]
fn uneven_scatter_fails_on_every_rank() {
    let results = run(3, config(), |comm| {
        let data = (comm.rank() == 0).then(|| Payload::from(iota(&[5, 2], 0)));
        comm.scatter(data, 0)
    });
    for result in results {
        assert_eq!(result, Err(Error::UnevenDistribution { len: 5, size: 3 }));
    }
}

#[test]
fn scatter_sequence_value_item_by_item() {
    let results = run(3, config(), |comm| {
        let data = (comm.rank() == 1).then(|| Payload::object(&["left", "middle", "right"]).unwrap());
        comm.scatter(data, 1).unwrap().to_object::<String>().unwrap()
    });
    assert_eq!(results, vec!["left", "middle", "right"]);
}

#[test]
fn scatter_rows_of_a_generic_array() {
    let results = run(2, config(), |comm| {
        let data = (comm.rank() == 0).then(|| Payload::from(arr2(&[[1u8, 2], [3, 4]]).into_dyn()));
        comm.scatter(data, 0).unwrap()
    });
    assert_eq!(results[0], Payload::from(arr1(&[1u8, 2]).into_dyn()));
    assert_eq!(results[1], Payload::from(arr1(&[3u8, 4]).into_dyn()));
}

#[test]
fn scatter_of_the_wrong_item_count_fails_without_hanging() {
    let results = run(3, config(), |comm| {
        let data = (comm.rank() == 0).then(|| Payload::object(&[1, 2]).unwrap());
        comm.scatter(data, 0)
    });
    assert!(matches!(results[0], Err(Error::InvalidArgument(_))));
    for result in &results[1..] {
        assert_eq!(
            result,
            &Err(Error::Transport(message::Error::MissingValue { root: 0 }))
        );
    }
}

// ============================================================================
// sequences of calls
// ============================================================================

#[test]
fn consecutive_collectives_do_not_interfere() {
    let results = run(3, config(), |comm| {
        let rank = comm.rank();
        let a = comm.broadcast((rank == 0).then(|| Payload::from(iota(&[3], 7))), 0).unwrap();
        let b = comm.gather(Payload::object(&rank).unwrap(), 2).unwrap();
        let c = comm.gather(iota(&[rank + 1], 0).into(), 1).unwrap();
        let d = comm
            .scatter((rank == 2).then(|| Payload::from(iota(&[3], 0))), 2)
            .unwrap();
        comm.barrier().unwrap();
        (a, b, c, d)
    });
    for (rank, (a, b, c, d)) in results.into_iter().enumerate() {
        assert_eq!(a, Payload::from(iota(&[3], 7)));
        assert_eq!(b.is_some(), rank == 2);
        assert_eq!(c.map(|items| items.len()), (rank == 1).then(|| 3));
        assert_eq!(d, Payload::from(ArrayD::from_elem(IxDyn(&[]), rank as i64)));
    }
}

#[test]
fn rejected_calls_leave_no_messages_behind() {
    let results = run(3, config(), |comm| {
        let rank = comm.rank();
        let n = rank + 1;
        let mismatch = comm.gather(iota(&[n, n], 0).into(), 0);
        let uneven = comm.scatter((rank == 0).then(|| Payload::from(iota(&[5, 2], 0))), 0);
        let gathered = comm
            .gather(ArrayD::from_elem(IxDyn(&[2]), rank as f64).into(), 1)
            .unwrap();
        let shared = comm
            .broadcast((rank == 2).then(|| Payload::from(iota(&[4], 40))), 2)
            .unwrap();
        comm.barrier().unwrap();
        (mismatch, uneven, gathered, shared)
    });
    for (rank, (mismatch, uneven, gathered, shared)) in results.into_iter().enumerate() {
        assert!(matches!(mismatch, Err(Error::ShapeMismatch { .. })));
        assert_eq!(uneven, Err(Error::UnevenDistribution { len: 5, size: 3 }));
        if rank == 1 {
            let gathered = gathered.unwrap();
            assert_eq!(gathered.len(), 3);
            for (source, item) in gathered.iter().enumerate() {
                assert_eq!(item, &Payload::from(ArrayD::from_elem(IxDyn(&[2]), source as f64)));
            }
        } else {
            assert!(gathered.is_none());
        }
        assert_eq!(shared, Payload::from(iota(&[4], 40)));
    }
}
