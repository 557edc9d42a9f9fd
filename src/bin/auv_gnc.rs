/**
 * AUV GNC Binary
 *
 * Runs the estimator, goal servers and thrust allocator in one process and
 * offers a small console for resets and test goals.
 *
 * Usage: auv_gnc [--config gnc.toml] [--port /dev/ttyACM0] [--baud 9600]
 */

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use anyhow::{bail, Context, Result};
use clap::Parser;
use crossbeam_channel::{self as channel, select, Receiver, Sender};
use nalgebra::{UnitQuaternion, Vector3};
use tracing::{info, warn};

use auv_gnc::auv::frames;
use auv_gnc::auv::{
    AuvController, AxisMask, EffortGoal, EffortMask, FrameMode, GoalHandle, MotionGoal, SerialSettings,
};
use auv_gnc::GncConfig;

#[derive(Parser, Debug)]
#[command(author, version, about = "AUV state estimation, goal servers and thrust allocation")]
struct Args{
    /// TOML config; calibrated defaults when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Serial port of the thruster board; thruster PWM stays on the bus when omitted
    #[arg(short, long)]
    port: Option<String>,

    #[arg(short, long, default_value_t = 9600)]
    baud: u32,
}

fn parse_floats(args: &[&str], count: usize) -> Result<Vec<f64>>{
    if args.len() != count{
        bail!("expected {count} numbers, got {}", args.len());
    }
    args.iter()
        .map(|a| a.parse::<f64>().with_context(|| format!("not a number: {a}")))
        .collect()
}

fn report_when_done(handle: Arc<GoalHandle>){
    thread::spawn(move ||{
        match handle.wait(){
            Ok(outcome) => println!("[GOAL {}] {:?}", handle.id(), outcome),
            Err(err) => println!("[GOAL {}] {}", handle.id(), err),
        }
    });
}

fn effort_goal(dof: &str, value: f64) -> Result<EffortGoal>{
    let mut goal = EffortGoal{ force: Vector3::zeros(), torque: Vector3::zeros(), axes: EffortMask::default() };
    match dof{
        "surge" => { goal.axes.surge = true; goal.force.x = value; }
        "sway" => { goal.axes.sway = true; goal.force.y = value; }
        "heave" => { goal.axes.heave = true; goal.force.z = value; }
        "roll" => { goal.axes.roll = true; goal.torque.x = value; }
        "pitch" => { goal.axes.pitch = true; goal.torque.y = value; }
        "yaw" => { goal.axes.yaw = true; goal.torque.z = value; }
        other => bail!("unknown degree of freedom: {other}"),
    }
    Ok(goal)
}

/// SIGINT/SIGTERM handler body: wake the console loop so shutdown runs
fn forward_signal(stop: Sender<()>) -> impl Fn() + Send + 'static{
    move ||{
        //a full channel means shutdown is already requested
        let _ = stop.try_send(());
    }
}

/// Console input on its own thread; the channel closes at EOF
fn stdin_lines() -> Receiver<String>{
    let (tx, rx) = channel::unbounded();
    thread::spawn(move ||{
        for line in io::stdin().lock().lines(){
            let Ok(line) = line else{
                break;
            };
            if tx.send(line).is_err(){
                break;
            }
        }
    });
    rx
}

fn print_help(){
    println!("[Commands]");
    println!("  reset | planar               - re-zero the world frame");
    println!("  status                       - print the pose estimate");
    println!("  goto x y z yaw               - absolute goal, yaw in degrees");
    println!("  move dx dy dz                - body-frame displacement");
    println!("  depth z                      - depth only");
    println!("  effort <dof> value           - open-loop surge/sway/heave/roll/pitch/yaw");
    println!("  cancel                       - cancel the last motion goal");
    println!("  x                            - exit\n");
}

fn prompt() -> Result<()>{
    print!("> ");
    io::stdout().flush()?;
    Ok(())
}

/// Serve console commands until exit, EOF or a termination signal, then
/// stop the controller. Thrusters end at neutral on every path.
fn run_console(auv: &mut AuvController, lines: &Receiver<String>, stop: &Receiver<()>) -> Result<()>{
    let result = console_loop(auv, lines, stop);
    println!("[SHUTDOWN]");
    auv.shutdown();
    result
}

fn console_loop(auv: &AuvController, lines: &Receiver<String>, stop: &Receiver<()>) -> Result<()>{
    let mut last_goal: Option<Arc<GoalHandle>> = None;
    prompt()?;

    loop{
        let line = select!{
            recv(stop) -> _ =>{
                warn!("termination signal received");
                return Ok(());
            }
            recv(lines) -> line => match line{
                Ok(line) => line,
                Err(_) => return Ok(()),
            },
        };
        let words: Vec<&str> = line.split_whitespace().collect();
        let Some((&cmd, rest)) = words.split_first() else{
            prompt()?;
            continue;
        };

        let goal = match cmd{
            "reset" => { auv.reset_full(); println!("[RESET]"); None }
            "planar" => { auv.reset_planar(); println!("[RESET PLANAR]"); None }
            "status" =>{
                match auv.estimator().current_estimate(){
                    Some(pose) =>{
                        let p = pose.position_world;
                        let [roll, pitch, yaw] = pose.theta_world_deg();
                        println!("[POSE] x={:.2} y={:.2} z={:.2} roll={:.1} pitch={:.1} yaw={:.1}", p.x, p.y, p.z, roll, pitch, yaw);
                    }
                    None => println!("[POSE] not ready"),
                }
                None
            }
            "goto" => match parse_floats(rest, 4){
                Ok(v) => Some(MotionGoal::pose(
                    Vector3::new(v[0], v[1], v[2]),
                    frames::from_rpy_deg([0.0, 0.0, v[3]]),
                )),
                Err(err) => { println!("{err}"); None }
            },
            "move" => match parse_floats(rest, 3){
                Ok(v) => Some(
                    MotionGoal::pose(Vector3::new(v[0], v[1], v[2]), UnitQuaternion::identity())
                        .with_axes(AxisMask{ x: true, y: true, z: true, orientation: false })
                        .with_mode(FrameMode::LocalRelative),
                ),
                Err(err) => { println!("{err}"); None }
            },
            "depth" => match parse_floats(rest, 1){
                Ok(v) => Some(
                    MotionGoal::pose(Vector3::new(0.0, 0.0, v[0]), UnitQuaternion::identity())
                        .with_axes(AxisMask{ z: true, ..Default::default() }),
                ),
                Err(err) => { println!("{err}"); None }
            },
            "effort" =>{
                let parsed = match rest{
                    [dof, value] => parse_floats(&[*value], 1).and_then(|v| effort_goal(dof, v[0])),
                    _ => Err(anyhow::anyhow!("usage: effort <dof> value")),
                };
                match parsed{
                    Ok(goal) =>{
                        let (id, outcome) = auv.effort().submit(&goal);
                        println!("[EFFORT {id}] {outcome:?}");
                    }
                    Err(err) => println!("{err}"),
                }
                None
            }
            "cancel" =>{
                match &last_goal{
                    Some(handle) => handle.cancel()?,
                    None => println!("no motion goal"),
                }
                None
            }
            "x" | "exit" | "quit" => return Ok(()),
            other => { println!("Unknown command: {other}"); None }
        };

        if let Some(goal) = goal{
            let handle = Arc::new(auv.motion().submit(goal)?);
            println!("[GOAL {}] submitted", handle.id());
            report_when_done(Arc::clone(&handle));
            last_goal = Some(handle);
        }
        prompt()?;
    }
}

fn main() -> Result<()>{
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = match &args.config{
        Some(path) => GncConfig::load(path)?,
        None => GncConfig::default(),
    };
    info!(?config, "config loaded");

    //installed before any thruster output so a signal always reaches shutdown
    let (stop_tx, stop_rx) = channel::bounded(1);
    ctrlc::set_handler(forward_signal(stop_tx)).context("installing signal handler")?;

    let serial = args.port.clone().map(|port| SerialSettings{ port, baud_rate: args.baud });
    let mut auv = AuvController::start(&config, serial.as_ref()).context("starting controller")?;

    print_help();
    run_console(&mut auv, &stdin_lines(), &stop_rx)
}
