use std::rc::Rc;

use crate::clock::Clock;
use crate::error::{EmulationError, EmulationResult};
use crate::memory::{Memory, MEMORY_SIZE};
use crate::registers::{RegisterAccess, Registers};

/*
 * Cpu
 * capability view over the fetch/execute machinery itself, for handlers and
 * reset mechanisms that consume operands or need the configured program
 * origin.
 */
pub trait Cpu {
    fn exec(&mut self) -> EmulationResult<()>;
    fn fetch(&mut self) -> EmulationResult<u8>;
    fn reset(&mut self) -> EmulationResult<()>;
    fn program_offset(&self) -> usize;
}

/*
 * Machine
 * the four capability views glued together, which is what an instruction
 * handler receives. Blanket implemented, so a test double only has to bring
 * the capabilities the code under test exercises.
 */
pub trait Machine: Cpu + Memory + RegisterAccess + Clock {}

impl<T: Cpu + Memory + RegisterAccess + Clock> Machine for T {}

pub type Instruction = Rc<dyn Fn(&mut dyn Machine) -> EmulationResult<()>>;

pub struct Config {
    pub program_offset: usize,
    pub reset_mechanism: Instruction,
}

impl Config {
    pub fn new(
        program_offset: usize,
        reset_mechanism: impl Fn(&mut dyn Machine) -> EmulationResult<()> + 'static,
    ) -> Config {
        Config {
            program_offset,
            reset_mechanism: Rc::new(reset_mechanism),
        }
    }
}

pub struct Emulator {
    memory: Vec<u8>,
    instructions: Vec<Option<Instruction>>,
    registers: Registers,
    cycles: usize,
    program_offset: usize,
    program_length: usize,
    reset_mechanism: Instruction,
}

impl std::fmt::Debug for Emulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Emulator")
            .field("memory_len", &self.memory.len())
            .field("instructions_len", &self.instructions.len())
            .field("cycles", &self.cycles)
            .field("program_offset", &self.program_offset)
            .field("program_length", &self.program_length)
            .finish_non_exhaustive()
    }
}

// zeroes the cycle counter when the dispatch scope ends, whatever the exit
// path: handler success, handler failure or unhandled opcode.
struct ClockReset<'a> {
    emulator: &'a mut Emulator,
}

impl Drop for ClockReset<'_> {
    fn drop(&mut self) {
        self.emulator.cycles = 0;
    }
}

impl Emulator {
    pub fn new(config: Config) -> EmulationResult<Emulator> {
        let mut emulator = Emulator {
            memory: vec![0x00; MEMORY_SIZE],
            instructions: vec![None; 256],
            registers: Registers::new(),
            cycles: 0,
            program_offset: config.program_offset,
            program_length: 0,
            reset_mechanism: config.reset_mechanism,
        };
        emulator.reset()?;

        Ok(emulator)
    }

    /// Registers the handler for an opcode, replacing any previous one.
    pub fn add_instruction(
        &mut self,
        opcode: u8,
        instruction: impl Fn(&mut dyn Machine) -> EmulationResult<()> + 'static,
    ) {
        self.instructions[opcode as usize] = Some(Rc::new(instruction));
    }

    /// Copies a program at the configured offset and arms the program window.
    pub fn load_program(&mut self, program: &[u8]) -> EmulationResult<()> {
        self.program_length = program.len();
        self.load(self.program_offset, program)
    }

    /// Executes the loaded program until the command pointer leaves the
    /// program window, returning the first error met on the way.
    pub fn run(&mut self) -> EmulationResult<()> {
        if self.program_length == 0 {
            return Err(EmulationError::program("there is no program loaded to run"));
        }

        while self.within_program_window() {
            self.exec()?;
        }

        Ok(())
    }

    /// Read-only register inspection for host tooling.
    pub fn registers(&self) -> &Registers {
        &self.registers
    }

    fn within_program_window(&self) -> bool {
        // a command pointer moved below the program offset leaves the window
        // just like one moved past its end
        self.registers
            .command_pointer
            .checked_sub(self.program_offset)
            .map_or(false, |executed| executed < self.program_length)
    }
}

impl Clock for Emulator {
    fn value(&self) -> usize {
        self.cycles
    }

    fn take(&mut self, cycles: usize) {
        self.cycles += cycles;
    }
}

impl Memory for Emulator {
    fn read(&mut self, addr: usize) -> EmulationResult<u8> {
        if addr >= MEMORY_SIZE {
            return Err(EmulationError::memory(format!(
                "memory exceeded at reading address {:#06x}",
                addr
            )));
        }
        self.take(1);

        Ok(self.memory[addr])
    }

    fn write(&mut self, addr: usize, value: u8) -> EmulationResult<()> {
        if addr >= MEMORY_SIZE {
            return Err(EmulationError::memory(format!(
                "memory exceeded at writing address {:#06x}",
                addr
            )));
        }
        self.memory[addr] = value;
        self.take(1);

        Ok(())
    }

    fn load(&mut self, addr: usize, data: &[u8]) -> EmulationResult<()> {
        if addr >= MEMORY_SIZE || data.len() > MEMORY_SIZE - addr {
            return Err(EmulationError::memory(format!(
                "{} bytes do not fit at address {:#06x}",
                data.len(),
                addr
            )));
        }
        self.memory[addr..addr + data.len()].copy_from_slice(data);

        Ok(())
    }

    fn dump(&self) -> &[u8] {
        &self.memory
    }
}

impl RegisterAccess for Emulator {
    fn regs(&mut self) -> &mut Registers {
        &mut self.registers
    }
}

impl Cpu for Emulator {
    fn exec(&mut self) -> EmulationResult<()> {
        let opcode = self.fetch()?;
        let mut scope = ClockReset { emulator: self };
        let instruction = match &scope.emulator.instructions[opcode as usize] {
            Some(instruction) => Rc::clone(instruction),
            None => {
                return Err(EmulationError::opcode(format!(
                    "unhandled opcode: {:#04x}",
                    opcode
                )))
            }
        };

        instruction(&mut *scope.emulator)
    }

    fn fetch(&mut self) -> EmulationResult<u8> {
        let opcode = self.read(self.registers.command_pointer)?;
        self.registers.command_pointer += 1;

        Ok(opcode)
    }

    fn reset(&mut self) -> EmulationResult<()> {
        let reset_mechanism = Rc::clone(&self.reset_mechanism);
        let result = reset_mechanism(&mut *self);
        self.cycles = 0;

        result
    }

    fn program_offset(&self) -> usize {
        self.program_offset
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::error::ErrorKind;

    fn test_emulator(program_offset: usize) -> Emulator {
        let config = Config::new(program_offset, |machine| {
            let program_offset = machine.program_offset();
            let regs = machine.regs();
            regs.command_pointer = program_offset;
            regs.stack_pointer = 0xff;

            Ok(())
        });

        Emulator::new(config).unwrap()
    }

    #[test]
    fn test_new_runs_the_reset_mechanism() {
        let emulator = test_emulator(0x1000);
        assert_eq!(0x1000, emulator.registers().command_pointer);
        assert_eq!(0xff, emulator.registers().stack_pointer);
        assert_eq!(0, emulator.value());
    }

    #[test]
    fn test_new_propagates_a_failing_reset_mechanism() {
        let config = Config::new(0x1000, |_machine| {
            Err(EmulationError::new(ErrorKind::Other("ResetError"), "broken"))
        });
        let error = Emulator::new(config).unwrap_err();
        assert!(error.is(ErrorKind::Other("ResetError")));
    }

    #[test]
    fn test_reset_is_idempotent() {
        let mut emulator = test_emulator(0x1000);
        emulator.regs().accumulator = 0x42;
        emulator.regs().command_pointer = 0x2000;
        emulator.reset().unwrap();
        let after_first = emulator.registers().clone();
        emulator.reset().unwrap();
        assert_eq!(after_first, *emulator.registers());
    }

    #[test]
    fn test_write_then_read() {
        let mut emulator = test_emulator(0x1000);
        emulator.write(0x8000, 0x42).unwrap();
        assert_eq!(1, emulator.value());
        assert_eq!(0x42, emulator.read(0x8000).unwrap());
        assert_eq!(2, emulator.value());
    }

    #[test]
    fn test_read_out_of_range() {
        let mut emulator = test_emulator(0x1000);
        let error = emulator.read(MEMORY_SIZE).unwrap_err();
        assert!(error.is(ErrorKind::Memory));
        assert_eq!(0, emulator.value());
    }

    #[test]
    fn test_write_out_of_range_leaves_memory_unchanged() {
        let mut emulator = test_emulator(0x1000);
        let snapshot = emulator.dump().to_vec();
        let error = emulator.write(MEMORY_SIZE, 0xff).unwrap_err();
        assert!(error.is(ErrorKind::Memory));
        assert_eq!(snapshot, emulator.dump());
        assert_eq!(0, emulator.value());
    }

    #[test]
    fn test_load_copies_bytes_without_charging_cycles() {
        let mut emulator = test_emulator(0x1000);
        emulator.load(0x8000, &[0x01, 0x02, 0x03]).unwrap();
        assert_eq!(&[0x01, 0x02, 0x03], &emulator.dump()[0x8000..0x8003]);
        assert_eq!(0, emulator.value());
    }

    #[test]
    fn test_load_fills_memory_exactly() {
        let mut emulator = test_emulator(0x1000);
        let data = vec![0xaa; MEMORY_SIZE];
        emulator.load(0x0000, &data).unwrap();
        assert_eq!(0xaa, emulator.dump()[MEMORY_SIZE - 1]);
    }

    #[test]
    fn test_load_crossing_the_top_fails() {
        let mut emulator = test_emulator(0x1000);
        let error = emulator
            .load(MEMORY_SIZE - 2, &[0x01, 0x02, 0x03])
            .unwrap_err();
        assert!(error.is(ErrorKind::Memory));

        let error = emulator.load(MEMORY_SIZE, &[]).unwrap_err();
        assert!(error.is(ErrorKind::Memory));
    }

    #[test]
    fn test_fetch_advances_on_success() {
        let mut emulator = test_emulator(0x1000);
        emulator.load(0x1000, &[0xca]).unwrap();
        assert_eq!(0xca, emulator.fetch().unwrap());
        assert_eq!(0x1001, emulator.registers().command_pointer);
        assert_eq!(1, emulator.value());
    }

    #[test]
    fn test_failed_fetch_leaves_the_command_pointer() {
        let mut emulator = test_emulator(0x1000);
        emulator.regs().command_pointer = MEMORY_SIZE;
        let error = emulator.fetch().unwrap_err();
        assert!(error.is(ErrorKind::Memory));
        assert_eq!(MEMORY_SIZE, emulator.registers().command_pointer);
    }

    #[test]
    fn test_exec_with_no_handler() {
        let mut emulator = test_emulator(0x1000);
        let error = emulator.exec().unwrap_err();
        assert!(error.is(ErrorKind::Opcode));
        // the fetch charge is wiped by the reset-on-exit
        assert_eq!(0, emulator.value());
        assert_eq!(0x1001, emulator.registers().command_pointer);
    }

    #[test]
    fn test_exec_charges_then_resets_the_clock() {
        let mut emulator = test_emulator(0x1000);
        let observed = Rc::new(Cell::new(0));
        let observer = Rc::clone(&observed);
        emulator.add_instruction(0x00, move |machine| {
            machine.take(1);
            observer.set(machine.value());

            Ok(())
        });

        emulator.exec().unwrap();
        // one cycle for the opcode fetch, one taken by the handler
        assert_eq!(2, observed.get());
        assert_eq!(0, emulator.value());
    }

    #[test]
    fn test_exec_resets_the_clock_when_the_handler_fails() {
        let mut emulator = test_emulator(0x1000);
        emulator.add_instruction(0x00, |machine| {
            machine.take(3);

            Err(EmulationError::new(ErrorKind::Other("DeviceError"), "jammed"))
        });

        let error = emulator.exec().unwrap_err();
        assert!(error.is(ErrorKind::Other("DeviceError")));
        assert_eq!(0, emulator.value());
    }

    #[test]
    fn test_the_latest_registration_wins() {
        let mut emulator = test_emulator(0x1000);
        emulator.add_instruction(0x00, |machine| {
            machine.regs().accumulator = 0x01;

            Ok(())
        });
        emulator.add_instruction(0x00, |machine| {
            machine.regs().accumulator = 0x02;

            Ok(())
        });

        emulator.exec().unwrap();
        assert_eq!(0x02, emulator.registers().accumulator);
    }

    #[test]
    fn test_run_without_a_program() {
        let mut emulator = test_emulator(0x1000);
        let error = emulator.run().unwrap_err();
        assert!(error.is(ErrorKind::Program));
        assert_eq!(0x1000, emulator.registers().command_pointer);
    }

    #[test]
    fn test_run_exhausts_the_program_window() {
        let mut emulator = test_emulator(0x1000);
        emulator.add_instruction(0xea, |_machine| Ok(()));
        emulator.load_program(&[0xea, 0xea, 0xea]).unwrap();

        emulator.run().unwrap();
        assert_eq!(0x1003, emulator.registers().command_pointer);
    }

    #[test]
    fn test_run_stops_at_the_first_error() {
        let mut emulator = test_emulator(0x1000);
        emulator.add_instruction(0xea, |_machine| Ok(()));
        emulator.load_program(&[0xea, 0x02, 0xea]).unwrap();

        let error = emulator.run().unwrap_err();
        assert!(error.is(ErrorKind::Opcode));
        assert_eq!(0x1002, emulator.registers().command_pointer);
    }

    #[test]
    fn test_run_ends_when_a_handler_jumps_below_the_offset() {
        let mut emulator = test_emulator(0x1000);
        emulator.add_instruction(0x4c, |machine| {
            machine.regs().command_pointer = 0x0000;

            Ok(())
        });
        emulator.load_program(&[0x4c, 0xff, 0xff]).unwrap();

        emulator.run().unwrap();
        assert_eq!(0x0000, emulator.registers().command_pointer);
    }

    #[test]
    fn test_load_program_too_large_for_the_offset() {
        let mut emulator = test_emulator(0xfffc);
        let error = emulator
            .load_program(&[0xea, 0xea, 0xea, 0xea, 0xea])
            .unwrap_err();
        assert!(error.is(ErrorKind::Memory));
    }
}
